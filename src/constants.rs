use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;

pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000";

/// Directory under the upload root holding generated variants.
pub const PROCESSED_DIR: &str = "processed";
