use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    entities::{
        image::{public_url, DeletedImage, ImageCategory, ImageInfoResponse, StorageStats},
        metadata::UpdateImageMetadataRequest,
        reference::{ImageReference, ReferenceReport, ReferenceType},
    },
    errors::AppError,
    storage::local::UploadStorage,
    utils::filename::validate_filename,
    SharedContentRepo, SharedMetadataRepo,
};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListImagesQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePage {
    pub items: Vec<ImageInfoResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Asset lookups, metadata edits, reference checks and reference-safe deletes.
pub struct ImageHandler {
    pub(crate) metadata_repo: SharedMetadataRepo,
    pub(crate) content_repo: SharedContentRepo,
    pub(crate) storage: Arc<UploadStorage>,
    pub(crate) db_timeout: Duration,
    pub(crate) public_base_path: String,
}

impl ImageHandler {
    pub fn new(
        metadata_repo: SharedMetadataRepo,
        content_repo: SharedContentRepo,
        storage: Arc<UploadStorage>,
        db_timeout: Duration,
        public_base_path: String,
    ) -> Self {
        ImageHandler {
            metadata_repo,
            content_repo,
            storage,
            db_timeout,
            public_base_path,
        }
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
        tokio::time::timeout(self.db_timeout, fut).await?
    }

    pub async fn get_info(&self, filename: &str) -> Result<ImageInfoResponse, AppError> {
        let filename = validate_filename(filename)?;

        let asset = self
            .timed(self.metadata_repo.get_asset(filename))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))?;

        Ok(asset.to_info_response(&self.public_base_path))
    }

    pub async fn list_images(&self, query: &ListImagesQuery) -> Result<ImagePage, AppError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let category = query
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse::<ImageCategory>)
            .transpose()?;

        let assets = self
            .timed(self.metadata_repo.list_assets(category, page, per_page))
            .await?;
        let total = self.timed(self.metadata_repo.count_assets(category)).await?;

        Ok(ImagePage {
            items: assets
                .iter()
                .map(|asset| asset.to_info_response(&self.public_base_path))
                .collect(),
            page,
            per_page,
            total,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_metadata(
        &self,
        filename: &str,
        request: &UpdateImageMetadataRequest,
    ) -> Result<ImageInfoResponse, AppError> {
        let filename = validate_filename(filename)?;

        let asset = self
            .timed(self.metadata_repo.get_asset(filename))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))?;

        let merged = request.apply_to(&asset.metadata)?;
        let updated = self
            .timed(self.metadata_repo.save_metadata(filename, &merged))
            .await?;

        Ok(updated.to_info_response(&self.public_base_path))
    }

    /// Category of a known image, from its row or, failing that, from disk.
    async fn category_of(&self, filename: &str) -> Result<ImageCategory, AppError> {
        if let Some(asset) = self.timed(self.metadata_repo.get_asset(filename)).await? {
            return Ok(asset.category);
        }
        self.storage
            .locate(filename)
            .await
            .map(|(category, _)| category)
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))
    }

    async fn scan_references(&self, filename: &str, category: ImageCategory) -> Result<ReferenceReport, AppError> {
        let url = public_url(&self.public_base_path, category, filename);
        let repo = &self.content_repo;

        let (articles, authors, categories, pages) = self
            .timed(async {
                tokio::try_join!(
                    repo.articles_using_image(filename, &url),
                    repo.authors_using_image(filename, &url),
                    repo.categories_using_image(filename, &url),
                    repo.static_pages_using_image(filename, &url),
                )
            })
            .await?;

        let references = [
            (ReferenceType::Article, articles),
            (ReferenceType::Author, authors),
            (ReferenceType::Category, categories),
            (ReferenceType::StaticPage, pages),
        ]
        .into_iter()
        .flat_map(|(kind, rows)| rows.into_iter().map(move |row| ImageReference::new(kind, row)))
        .collect();

        Ok(ReferenceReport::new(filename, references))
    }

    pub async fn find_references(&self, filename: &str) -> Result<ReferenceReport, AppError> {
        let filename = validate_filename(filename)?;
        let category = self.category_of(filename).await?;
        self.scan_references(filename, category).await
    }

    /// Deletes the row, then the original and its variants, unless content
    /// still uses the image. Deletes of the same filename are serialised; a
    /// reference created by the CMS between the scan and the removal is not
    /// detected.
    #[instrument(skip(self))]
    pub async fn delete_image(&self, filename: &str) -> Result<DeletedImage, AppError> {
        let filename = validate_filename(filename)?;

        let lock = self.storage.lock_for(filename);
        let result = {
            let _guard = lock.lock().await;
            self.delete_unreferenced(filename).await
        };
        drop(lock);
        self.storage.release_lock(filename);

        result
    }

    async fn delete_unreferenced(&self, filename: &str) -> Result<DeletedImage, AppError> {
        let category = self.category_of(filename).await?;

        let report = self.scan_references(filename, category).await?;
        if !report.can_delete {
            return Err(AppError::ImageInUse(report));
        }

        // A row never outlives its files. Files left by a failed removal are
        // found again by probing, so a retried delete completes.
        self.timed(self.metadata_repo.delete_asset(filename)).await?;
        let files_removed = self.storage.remove_asset_files(category, filename).await?;

        info!(filename, files_removed, "image deleted");
        Ok(DeletedImage {
            filename: filename.to_string(),
            files_removed,
        })
    }

    pub async fn storage_stats(&self) -> Result<StorageStats, AppError> {
        let breakdown = self.timed(self.metadata_repo.category_stats()).await?;

        Ok(StorageStats {
            indexed_files: self.storage.indexed_count(),
            total_assets: breakdown.iter().map(|s| s.count).sum(),
            total_bytes: breakdown.iter().map(|s| s.total_bytes).sum(),
            breakdown,
        })
    }
}
