use std::{sync::Arc, time::Duration};

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod api_errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, imaging, limiter, storage, utils, web};

use auth::jwt::JwtService;
use imaging::processor::ImageProcessor;
use limiter::rate_limiter::RateHybridLimiterStore;
use repositories::{
    content::ContentRepository,
    metadata::MetadataRepository,
    sqlx_repo::{SqlxContentRepo, SqlxMetadataRepo},
};
use storage::local::UploadStorage;
use use_cases::{images::ImageHandler, uploads::{UploadHandler, UploadLimits}};

pub type SharedMetadataRepo = Arc<dyn MetadataRepository>;
pub type SharedContentRepo = Arc<dyn ContentRepository>;

pub struct AppState {
    pub config: settings::AppConfig,
    pub token_service: JwtService,
    pub storage: Arc<UploadStorage>,
    pub metadata_repo: SharedMetadataRepo,
    pub upload_handler: UploadHandler,
    pub image_handler: ImageHandler,
    pub upload_limiter: RateHybridLimiterStore,
}

impl AppState {
    /// Wires the Postgres-backed repositories and bootstraps the upload directories.
    pub fn new(config: &settings::AppConfig, pool: sqlx::PgPool) -> std::io::Result<Self> {
        let metadata_repo: SharedMetadataRepo = Arc::new(SqlxMetadataRepo::new(pool.clone()));
        let content_repo: SharedContentRepo = Arc::new(SqlxContentRepo::new(pool));

        Self::from_parts(config, metadata_repo, content_repo)
    }

    pub fn from_parts(
        config: &settings::AppConfig,
        metadata_repo: SharedMetadataRepo,
        content_repo: SharedContentRepo,
    ) -> std::io::Result<Self> {
        let storage = Arc::new(UploadStorage::init(&config.upload_dir)?);
        let processor = ImageProcessor::new(config.variant_workers);

        let upload_handler = UploadHandler::new(
            metadata_repo.clone(),
            storage.clone(),
            processor,
            UploadLimits {
                max_file_size: config.max_file_size,
                max_files: config.max_files,
            },
            config.public_base_path.clone(),
        );

        let image_handler = ImageHandler::new(
            metadata_repo.clone(),
            content_repo,
            storage.clone(),
            Duration::from_secs(config.db_timeout_secs),
            config.public_base_path.clone(),
        );

        let limit = config.upload_rate_limit.max(1);
        let upload_limiter = RateHybridLimiterStore::new(
            limit as f64,
            limit as f64 / 60.0,
            Duration::from_secs(60),
            limit,
            Duration::from_secs(600),
        );

        Ok(AppState {
            config: config.clone(),
            token_service: JwtService::new(config),
            storage,
            metadata_repo,
            upload_handler,
            image_handler,
            upload_limiter,
        })
    }
}
