use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    entities::reference::ContentRef,
    errors::AppError,
    repositories::sqlx_repo::SqlxContentRepo,
};

/// Read-only view of CMS content used to find image usage.
///
/// Every lookup receives the bare filename and the public URL of the
/// original, since content may store either form.
#[async_trait]
pub trait ContentRepository: Sync + Send {
    /// Featured image, gallery entry, or mention in the body.
    async fn articles_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError>;
    async fn authors_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError>;
    async fn categories_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError>;
    /// Mention in the page body.
    async fn static_pages_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError>;
}

impl SqlxContentRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxContentRepo { pool }
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepo {
    async fn articles_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError> {
        let rows = sqlx::query_as::<_, ContentRef>(
            r#"
            SELECT id, title, slug FROM articles
            WHERE featured_image IN ($1, $2)
               OR $1 = ANY(gallery) OR $2 = ANY(gallery)
               OR strpos(content, $1) > 0
            ORDER BY title
            "#,
        )
        .bind(filename)
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn authors_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError> {
        let rows = sqlx::query_as::<_, ContentRef>(
            "SELECT id, name AS title, slug FROM authors WHERE avatar IN ($1, $2) ORDER BY name",
        )
        .bind(filename)
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn categories_using_image(&self, filename: &str, url: &str) -> Result<Vec<ContentRef>, AppError> {
        let rows = sqlx::query_as::<_, ContentRef>(
            "SELECT id, name AS title, slug FROM categories WHERE image IN ($1, $2) ORDER BY name",
        )
        .bind(filename)
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn static_pages_using_image(&self, filename: &str, _url: &str) -> Result<Vec<ContentRef>, AppError> {
        let rows = sqlx::query_as::<_, ContentRef>(
            "SELECT id, title, slug FROM static_pages WHERE strpos(content, $1) > 0 ORDER BY title",
        )
        .bind(filename)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
