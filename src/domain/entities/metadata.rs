use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

// ───── Constants ──────────────────────────────────────────────────────
const MIN_ALT_TEXT_LENGTH: usize = 3;
const MAX_ALT_TEXT_LENGTH: u64 = 250;
const MAX_TITLE_LENGTH: u64 = 200;
const MAX_DESCRIPTION_LENGTH: u64 = 2000;
const MAX_CAPTION_LENGTH: u64 = 500;
const MAX_CREDIT_LENGTH: u64 = 200;
const MAX_TAGS: usize = 30;

/// Descriptive fields attached to an asset. Every string is trimmed and
/// never absent, so renderers don't have to special-case nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageMetadata {
    pub alt_text: String,
    pub title: String,
    pub description: String,
    pub caption: String,
    pub credit: String,
    pub copyright: String,
    pub tags: Vec<String>,
}

/// Trims every field and normalises tags. Applying it twice changes nothing.
pub fn sanitize_metadata(metadata: &ImageMetadata) -> ImageMetadata {
    ImageMetadata {
        alt_text: metadata.alt_text.trim().to_string(),
        title: metadata.title.trim().to_string(),
        description: metadata.description.trim().to_string(),
        caption: metadata.caption.trim().to_string(),
        credit: metadata.credit.trim().to_string(),
        copyright: metadata.copyright.trim().to_string(),
        tags: sanitize_tags(&metadata.tags),
    }
}

fn sanitize_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|existing| existing == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

// ───── Input & Validation Requests ──────────────────────────────────

/// Partial update: only submitted fields overwrite stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateImageMetadataRequest {
    #[validate(
        length(max = MAX_ALT_TEXT_LENGTH),
        custom(function = "validate_alt_text")
    )]
    pub alt_text: Option<String>,

    #[validate(length(max = MAX_TITLE_LENGTH))]
    pub title: Option<String>,

    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,

    #[validate(length(max = MAX_CAPTION_LENGTH))]
    pub caption: Option<String>,

    #[validate(length(max = MAX_CREDIT_LENGTH))]
    pub credit: Option<String>,

    #[validate(length(max = MAX_CREDIT_LENGTH))]
    pub copyright: Option<String>,

    /// Kept as raw JSON so a non-array value yields a field error instead of
    /// a body parse failure.
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<serde_json::Value>,
}

impl UpdateImageMetadataRequest {
    /// Validates the request and merges it over `current`.
    pub fn apply_to(&self, current: &ImageMetadata) -> Result<ImageMetadata, ValidationErrors> {
        self.validate()?;

        let mut merged = current.clone();
        if let Some(v) = &self.alt_text {
            merged.alt_text = v.clone();
        }
        if let Some(v) = &self.title {
            merged.title = v.clone();
        }
        if let Some(v) = &self.description {
            merged.description = v.clone();
        }
        if let Some(v) = &self.caption {
            merged.caption = v.clone();
        }
        if let Some(v) = &self.credit {
            merged.credit = v.clone();
        }
        if let Some(v) = &self.copyright {
            merged.copyright = v.clone();
        }
        if let Some(value) = &self.tags {
            merged.tags = tags_from_value(value);
        }

        let merged = sanitize_metadata(&merged);

        if merged.alt_text.chars().count() < MIN_ALT_TEXT_LENGTH {
            let mut errors = ValidationErrors::new();
            errors.add("alt_text", new_validation_error("alt_text_required", "Alt text is required and must be at least 3 characters"));
            return Err(errors);
        }

        Ok(merged)
    }
}

fn tags_from_value(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ───── Validation Helpers ───────────────────────────────────────────

pub fn validate_alt_text(alt_text: &str) -> Result<(), ValidationError> {
    if alt_text.trim().chars().count() < MIN_ALT_TEXT_LENGTH {
        return Err(new_validation_error("alt_text_length", "Alt text must be at least 3 characters"));
    }
    Ok(())
}

pub fn validate_tags(value: &serde_json::Value) -> Result<(), ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| new_validation_error("tags_not_array", "Tags must be an array of strings"))?;

    if !items.iter().all(|item| item.is_string()) {
        return Err(new_validation_error("tags_not_strings", "Tags must be an array of strings"));
    }
    if items.len() > MAX_TAGS {
        return Err(new_validation_error("too_many_tags", "Too many tags provided"));
    }
    Ok(())
}

fn new_validation_error(code: &'static str, msg: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(msg));
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> UpdateImageMetadataRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn sanitize_is_idempotent() {
        let raw = ImageMetadata {
            alt_text: "  Mayor at the podium \n".into(),
            title: "\tCouncil vote".into(),
            description: String::new(),
            caption: " caption ".into(),
            credit: "  Staff ".into(),
            copyright: " (c) Daily ".into(),
            tags: vec![" politics ".into(), "".into(), "   ".into(), "city".into(), "politics".into()],
        };

        let once = sanitize_metadata(&raw);
        let twice = sanitize_metadata(&once);

        assert_eq!(once, twice);
        assert_eq!(once.alt_text, "Mayor at the podium");
        assert_eq!(once.tags, vec!["politics", "city"]);
    }

    #[test]
    fn partial_update_only_touches_submitted_fields() {
        let current = ImageMetadata {
            alt_text: "Flooded high street".into(),
            title: "Floods".into(),
            credit: "Agency".into(),
            ..Default::default()
        };

        let merged = request(json!({ "caption": "  Water levels rose overnight " }))
            .apply_to(&current)
            .unwrap();

        assert_eq!(merged.caption, "Water levels rose overnight");
        assert_eq!(merged.title, "Floods");
        assert_eq!(merged.credit, "Agency");
        assert_eq!(merged.alt_text, "Flooded high street");
    }

    #[test]
    fn short_alt_text_is_rejected() {
        let err = request(json!({ "altText": "  ab  " }))
            .apply_to(&ImageMetadata::default())
            .unwrap_err();
        assert!(err.field_errors().contains_key("alt_text"));
    }

    #[test]
    fn first_update_must_carry_alt_text() {
        let err = request(json!({ "title": "No alt yet" }))
            .apply_to(&ImageMetadata::default())
            .unwrap_err();
        assert!(err.field_errors().contains_key("alt_text"));
    }

    #[test]
    fn tags_must_be_an_array_of_strings() {
        let current = ImageMetadata { alt_text: "Valid alt".into(), ..Default::default() };

        assert!(request(json!({ "tags": "news" })).apply_to(&current).is_err());
        assert!(request(json!({ "tags": ["news", 4] })).apply_to(&current).is_err());

        let merged = request(json!({ "tags": [" news ", "", "local"] }))
            .apply_to(&current)
            .unwrap();
        assert_eq!(merged.tags, vec!["news", "local"]);
    }
}
