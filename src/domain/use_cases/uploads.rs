use std::{path::PathBuf, sync::Arc};

use actix_multipart::Multipart;
use chrono::Utc;
use futures_util::{future::join_all, TryStreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::{
    api_errors::UploadError,
    entities::image::{public_url, AssetStatus, ImageCategory, NewImageAsset, UploadedImage},
    imaging::processor::ImageProcessor,
    storage::local::{generate_filename, UploadBatch, UploadStorage},
    utils::mime::{is_image_mime, sniff_is_image},
    SharedMetadataRepo,
};

/// Bytes kept from the start of each upload for signature sniffing.
const SNIFF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Single,
    Multiple,
}

impl UploadMode {
    pub fn accepts_field(&self, field_name: &str) -> bool {
        match self {
            UploadMode::Single => matches!(field_name, "image" | "featuredImage" | "avatar"),
            UploadMode::Multiple => matches!(field_name, "images" | "gallery"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_files: usize,
}

impl UploadLimits {
    fn max_mb(&self) -> u64 {
        self.max_file_size.div_ceil(1024 * 1024)
    }
}

/// An original written to disk but not yet recorded.
struct StagedFile {
    field_name: String,
    original_name: String,
    filename: String,
    category: ImageCategory,
    mime_type: String,
    size: u64,
    path: PathBuf,
}

pub struct UploadHandler {
    metadata_repo: SharedMetadataRepo,
    storage: Arc<UploadStorage>,
    processor: ImageProcessor,
    limits: UploadLimits,
    public_base_path: String,
}

impl UploadHandler {
    pub fn new(
        metadata_repo: SharedMetadataRepo,
        storage: Arc<UploadStorage>,
        processor: ImageProcessor,
        limits: UploadLimits,
        public_base_path: String,
    ) -> Self {
        UploadHandler {
            metadata_repo,
            storage,
            processor,
            limits,
            public_base_path,
        }
    }

    /// Streams every file part to disk, records the assets and derives their
    /// variants. A failure anywhere before the rows are stored removes every
    /// file the request wrote.
    #[instrument(skip(self, payload))]
    pub async fn accept(&self, mut payload: Multipart, mode: UploadMode) -> Result<Vec<UploadedImage>, UploadError> {
        let mut batch = self.storage.batch();
        let staged = match self.stage_and_record(&mut payload, mode, &mut batch).await {
            Ok(staged) => staged,
            Err(e) => {
                batch.rollback().await;
                return Err(e);
            }
        };
        batch.commit();

        join_all(staged.iter().map(|file| self.process_variants(file))).await;

        info!(count = staged.len(), ?mode, "images uploaded");

        Ok(staged
            .into_iter()
            .map(|file| UploadedImage {
                url: public_url(&self.public_base_path, file.category, &file.filename),
                filename: file.filename,
                original_name: file.original_name,
                size: file.size,
                mimetype: file.mime_type,
            })
            .collect())
    }

    /// Writes every original of the request into `batch` and inserts their
    /// rows in one statement.
    async fn stage_and_record(
        &self,
        payload: &mut Multipart,
        mode: UploadMode,
        batch: &mut UploadBatch<'_>,
    ) -> Result<Vec<StagedFile>, UploadError> {
        let mut staged: Vec<StagedFile> = Vec::new();

        while let Some(mut field) = payload.try_next().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            let original_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);

            let Some(original_name) = original_name else {
                while field.try_next().await?.is_some() {}
                continue;
            };

            if !mode.accepts_field(&field_name) {
                return Err(UploadError::UnexpectedField(field_name));
            }
            if mode == UploadMode::Single && !staged.is_empty() {
                return Err(UploadError::UnexpectedField(field_name));
            }
            if staged.len() >= self.limits.max_files {
                return Err(UploadError::TooManyFiles(self.limits.max_files));
            }

            let mime_type = field
                .content_type()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_default();
            if !is_image_mime(&mime_type) {
                return Err(UploadError::InvalidFileType);
            }

            let category = ImageCategory::for_field(&field_name);
            let filename = generate_filename(&field_name, &original_name, &mime_type);
            let mut file = self.storage.create_original(category, &filename).await?;
            batch.track(category, &filename);

            let mut size: u64 = 0;
            let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
            while let Some(chunk) = field.try_next().await? {
                size += chunk.len() as u64;
                if size > self.limits.max_file_size {
                    return Err(UploadError::FileTooLarge { max_mb: self.limits.max_mb() });
                }
                if head.len() < SNIFF_LEN {
                    let take = (SNIFF_LEN - head.len()).min(chunk.len());
                    head.extend_from_slice(&chunk[..take]);
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            if !sniff_is_image(&head) {
                return Err(UploadError::InvalidFileType);
            }

            staged.push(StagedFile {
                path: self.storage.original_path(category, &filename),
                field_name,
                original_name,
                filename,
                category,
                mime_type,
                size,
            });
        }

        if staged.is_empty() {
            return Err(UploadError::NoFile);
        }

        let uploaded_at = Utc::now();
        let mut rows = Vec::with_capacity(staged.len());
        for file in &staged {
            let dims = self.processor.probe(file.path.clone()).await?;
            rows.push(NewImageAsset {
                filename: file.filename.clone(),
                original_name: file.original_name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.size,
                category: file.category,
                stored_path: file.path.to_string_lossy().into_owned(),
                width: dims.width,
                height: dims.height,
                status: AssetStatus::Uploaded,
                uploaded_at,
            });
        }

        self.metadata_repo.insert_assets(&rows).await?;
        Ok(staged)
    }

    /// Moves an asset through `variants_pending` to `variants_ready`, or to
    /// `processing_failed` with its original left in place.
    async fn process_variants(&self, file: &StagedFile) -> AssetStatus {
        if let Err(e) = self
            .metadata_repo
            .update_processing(&file.filename, AssetStatus::VariantsPending, &[])
            .await
        {
            warn!(filename = %file.filename, error = %e, "could not mark variants pending");
        }

        let generated = self
            .processor
            .generate_variants(file.path.clone(), file.filename.clone(), self.storage.processed_dir())
            .await;

        let (status, variants) = match generated {
            Ok(variants) => (AssetStatus::VariantsReady, variants),
            Err(e) => {
                warn!(
                    filename = %file.filename,
                    field = %file.field_name,
                    error = %e,
                    "variant generation failed; keeping original"
                );
                if let Err(e) = self.storage.remove_variant_files(&file.filename).await {
                    warn!(filename = %file.filename, error = %e, "could not remove partial variants");
                }
                (AssetStatus::ProcessingFailed, Vec::new())
            }
        };

        if let Err(e) = self
            .metadata_repo
            .update_processing(&file.filename, status, &variants)
            .await
        {
            warn!(filename = %file.filename, error = %e, "could not record variant status");
        }
        status
    }
}
