use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::debug;

use crate::{
    entities::{
        image::ImageCategory,
        variant::{OutputFormat, VariantName},
    },
    errors::AppError,
    use_cases::images::ImageHandler,
    utils::{filename::validate_filename, mime::mime_for_path},
};

/// A file chosen for delivery, with the validators needed for caching.
#[derive(Debug, Clone)]
pub struct DeliveryFile {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub etag: String,
    pub len: u64,
    /// `false` when the requested variant was missing and the original is served.
    pub is_variant: bool,
}

/// Strong ETag built from modification time and size.
pub fn compute_etag(modified: SystemTime, len: u64) -> String {
    let stamp = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("\"{:x}-{:x}\"", stamp, len)
}

/// `If-None-Match` check using weak comparison.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let normalize = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let target = normalize(etag);

    if_none_match
        .split(',')
        .any(|candidate| candidate.trim() == "*" || normalize(candidate) == target)
}

async fn describe(path: &Path, content_type: &'static str, is_variant: bool) -> Option<DeliveryFile> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let modified = meta.modified().unwrap_or(UNIX_EPOCH);
    Some(DeliveryFile {
        path: path.to_path_buf(),
        content_type,
        etag: compute_etag(modified, meta.len()),
        len: meta.len(),
        is_variant,
    })
}

impl ImageHandler {
    /// Picks the variant file for `size` and the negotiated format, falling
    /// back to the original while variants are pending or after they failed.
    pub async fn resolve_delivery(
        &self,
        filename: &str,
        size: Option<&str>,
        format: Option<&str>,
        accept: Option<&str>,
    ) -> Result<DeliveryFile, AppError> {
        let filename = validate_filename(filename)?;
        let variant = size
            .filter(|s| !s.is_empty())
            .map(str::parse::<VariantName>)
            .transpose()?
            .unwrap_or(VariantName::Original);
        let format = OutputFormat::negotiate(format, accept)?;

        let (_, original) = self
            .storage
            .locate(filename)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))?;

        let variant_path = self.storage.variant_path(filename, variant, format);
        if let Some(file) = describe(&variant_path, format.mime_type(), true).await {
            return Ok(file);
        }

        debug!(filename, %variant, %format, "variant missing, serving original");
        describe(&original, mime_for_path(&original), false)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))
    }

    pub async fn resolve_original(&self, category: &str, filename: &str) -> Result<DeliveryFile, AppError> {
        let filename = validate_filename(filename)?;
        let category: ImageCategory = category
            .parse()
            .map_err(|_| AppError::NotFound(format!("Image {} not found", filename)))?;

        let path = self.storage.original_path(category, filename);
        describe(&path, mime_for_path(&path), false)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))
    }
}
