use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::storage::local::UploadStorage;

const ORPHAN_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);

/// Daily removal of processed variants whose original no longer exists.
pub async fn start_orphan_sweep(storage: Arc<UploadStorage>) {
    let mut interval = interval(ORPHAN_SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        match storage.sweep_orphan_variants().await {
            Ok(0) => tracing::debug!("No orphaned variants found"),
            Ok(count) => tracing::info!("Removed {} orphaned variant files", count),
            Err(e) => tracing::error!("Orphan sweep failed: {}", e)
        }
    }
}
