use serde::Serialize;
use uuid::Uuid;

/// Content classes scanned for image usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Article,
    Author,
    Category,
    StaticPage,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 4] = [
        ReferenceType::Article,
        ReferenceType::Author,
        ReferenceType::Category,
        ReferenceType::StaticPage,
    ];

    fn label(&self, count: usize) -> &'static str {
        match (self, count == 1) {
            (ReferenceType::Article, true) => "article",
            (ReferenceType::Article, false) => "articles",
            (ReferenceType::Author, true) => "author",
            (ReferenceType::Author, false) => "authors",
            (ReferenceType::Category, true) => "category",
            (ReferenceType::Category, false) => "categories",
            (ReferenceType::StaticPage, true) => "static page",
            (ReferenceType::StaticPage, false) => "static pages",
        }
    }

    fn url_prefix(&self) -> &'static str {
        match self {
            ReferenceType::Article => "/articles",
            ReferenceType::Author => "/authors",
            ReferenceType::Category => "/categories",
            ReferenceType::StaticPage => "/pages",
        }
    }
}

/// A content row that mentions an image, as returned by the content store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ContentRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageReference {
    #[serde(rename = "type")]
    pub kind: ReferenceType,
    pub id: Uuid,
    pub title: String,
    pub url: String,
}

impl ImageReference {
    pub fn new(kind: ReferenceType, content: ContentRef) -> Self {
        ImageReference {
            kind,
            id: content.id,
            url: format!("{}/{}", kind.url_prefix(), content.slug),
            title: content.title,
        }
    }
}

/// Result of a live scan; never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceReport {
    pub filename: String,
    pub references: Vec<ImageReference>,
    pub can_delete: bool,
    pub summary: String,
}

impl ReferenceReport {
    pub fn new(filename: &str, references: Vec<ImageReference>) -> Self {
        ReferenceReport {
            filename: filename.to_string(),
            can_delete: references.is_empty(),
            summary: summarize(&references),
            references,
        }
    }
}

fn summarize(references: &[ImageReference]) -> String {
    if references.is_empty() {
        return "Image is not used by any content.".to_string();
    }

    let parts: Vec<String> = ReferenceType::ALL
        .iter()
        .filter_map(|kind| {
            let count = references.iter().filter(|r| r.kind == *kind).count();
            (count > 0).then(|| format!("{} {}", count, kind.label(count)))
        })
        .collect();

    format!("Image is used in {}.", parts.join(", "))
}
