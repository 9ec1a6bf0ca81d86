use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::{
    entities::{metadata::ImageMetadata, variant::{ImageVariant, VariantInfo}},
    errors::AppError,
};

// ───── Categories & status ─────────────────────────────────────────────

/// Upload directory an asset lives in, chosen from the multipart field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Articles,
    Authors,
    Images,
}

impl ImageCategory {
    pub const ALL: [ImageCategory; 3] = [
        ImageCategory::Articles,
        ImageCategory::Authors,
        ImageCategory::Images,
    ];

    pub fn for_field(field_name: &str) -> Self {
        match field_name {
            "featuredImage" | "gallery" => ImageCategory::Articles,
            "avatar" => ImageCategory::Authors,
            _ => ImageCategory::Images,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Articles => "articles",
            ImageCategory::Authors => "authors",
            ImageCategory::Images => "images",
        }
    }
}

impl FromStr for ImageCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "articles" => Ok(ImageCategory::Articles),
            "authors" => Ok(ImageCategory::Authors),
            "images" => Ok(ImageCategory::Images),
            other => Err(AppError::InvalidInput(format!("Unknown image category: {}", other))),
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an asset's derived variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Uploaded,
    VariantsPending,
    VariantsReady,
    ProcessingFailed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Uploaded => "uploaded",
            AssetStatus::VariantsPending => "variants_pending",
            AssetStatus::VariantsReady => "variants_ready",
            AssetStatus::ProcessingFailed => "processing_failed",
        }
    }
}

impl FromStr for AssetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(AssetStatus::Uploaded),
            "variants_pending" => Ok(AssetStatus::VariantsPending),
            "variants_ready" => Ok(AssetStatus::VariantsReady),
            "processing_failed" => Ok(AssetStatus::ProcessingFailed),
            other => Err(AppError::InternalError(format!("Unknown asset status: {}", other))),
        }
    }
}

// ───── Database Models ───────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub struct ImageAssetRow {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub category: String,
    pub stored_path: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub status: String,
    pub variants: Json<Vec<ImageVariant>>,
    pub alt_text: String,
    pub title: String,
    pub description: String,
    pub caption: String,
    pub credit: String,
    pub copyright: String,
    pub tags: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub category: ImageCategory,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub status: AssetStatus,
    pub variants: Vec<ImageVariant>,
    pub metadata: ImageMetadata,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written by the upload intake once the original is on disk.
#[derive(Debug, Clone)]
pub struct NewImageAsset {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub category: ImageCategory,
    pub stored_path: String,
    pub width: u32,
    pub height: u32,
    pub status: AssetStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl NewImageAsset {
    pub fn into_asset(self) -> ImageAsset {
        ImageAsset {
            filename: self.filename,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size: self.size,
            category: self.category,
            stored_path: self.stored_path,
            width: Some(self.width),
            height: Some(self.height),
            status: self.status,
            variants: Vec::new(),
            metadata: ImageMetadata::default(),
            uploaded_at: self.uploaded_at,
            updated_at: self.uploaded_at,
        }
    }
}

// ───── API Response Models ──────────────────────────────────────────

/// Shape returned by the upload endpoints for every stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfoResponse {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    pub category: ImageCategory,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub status: AssetStatus,
    pub metadata: ImageMetadata,
    pub variants: Vec<VariantInfo>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedImage {
    pub filename: String,
    pub files_removed: usize,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub status: String,
    pub count: i64,
    pub total_bytes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub indexed_files: usize,
    pub total_assets: i64,
    pub total_bytes: i64,
    pub breakdown: Vec<CategoryStats>,
}

// ───── Conversions ──────────────────────────────────────────────────

impl TryFrom<ImageAssetRow> for ImageAsset {
    type Error = AppError;

    fn try_from(row: ImageAssetRow) -> Result<Self, Self::Error> {
        Ok(ImageAsset {
            category: row.category.parse()?,
            status: row.status.parse()?,
            size: row.size_bytes.max(0) as u64,
            width: row.width.map(|w| w.max(0) as u32),
            height: row.height.map(|h| h.max(0) as u32),
            variants: row.variants.0,
            metadata: ImageMetadata {
                alt_text: row.alt_text,
                title: row.title,
                description: row.description,
                caption: row.caption,
                credit: row.credit,
                copyright: row.copyright,
                tags: row.tags,
            },
            filename: row.filename,
            original_name: row.original_name,
            mime_type: row.mime_type,
            stored_path: row.stored_path,
            uploaded_at: row.uploaded_at,
            updated_at: row.updated_at,
        })
    }
}

impl ImageAsset {
    pub fn public_url(&self, base_path: &str) -> String {
        public_url(base_path, self.category, &self.filename)
    }

    pub fn to_info_response(&self, base_path: &str) -> ImageInfoResponse {
        ImageInfoResponse {
            filename: self.filename.clone(),
            original_name: self.original_name.clone(),
            url: self.public_url(base_path),
            mime_type: self.mime_type.clone(),
            size: self.size,
            category: self.category,
            width: self.width,
            height: self.height,
            status: self.status,
            metadata: self.metadata.clone(),
            variants: self
                .variants
                .iter()
                .map(|v| v.to_info(self.size))
                .collect(),
            uploaded_at: self.uploaded_at,
            updated_at: self.updated_at,
        }
    }
}

pub fn public_url(base_path: &str, category: ImageCategory, filename: &str) -> String {
    format!("{}/{}/{}", base_path.trim_end_matches('/'), category, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_pick_their_directory() {
        assert_eq!(ImageCategory::for_field("featuredImage"), ImageCategory::Articles);
        assert_eq!(ImageCategory::for_field("gallery"), ImageCategory::Articles);
        assert_eq!(ImageCategory::for_field("avatar"), ImageCategory::Authors);
        assert_eq!(ImageCategory::for_field("image"), ImageCategory::Images);
        assert_eq!(ImageCategory::for_field("images"), ImageCategory::Images);
    }

    #[test]
    fn status_round_trips_through_text_column() {
        for status in [
            AssetStatus::Uploaded,
            AssetStatus::VariantsPending,
            AssetStatus::VariantsReady,
            AssetStatus::ProcessingFailed,
        ] {
            assert_eq!(status.as_str().parse::<AssetStatus>().unwrap(), status);
        }
    }

    #[test]
    fn public_url_tolerates_trailing_slash() {
        assert_eq!(
            public_url("/uploads/", ImageCategory::Authors, "avatar-1-2.png"),
            "/uploads/authors/avatar-1-2.png"
        );
    }
}
