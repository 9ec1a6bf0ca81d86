use actix_web::{web, get, HttpResponse, Responder};
use humantime::format_duration;
use once_cell::sync::Lazy;
use chrono::Utc;
use std::{
    time::Duration,
    sync::{atomic::{AtomicI64, Ordering}, RwLock},
};
use sysinfo::System;
use serde::Serialize;
use tracing::instrument;

use crate::{
    constants::START_TIME,
    entities::response::ApiResponse,
    errors::AppError,
    use_cases::extractors::AdminClaims,
    AppState,
};

const HEALTH_CACHE_SECS: i64 = 5;

#[derive(Serialize, Clone, Default)]
struct SystemInfo {
    os: String,
    kernel: String,
    hostname: String,
    cpu_count: usize,
    memory_total: String,
}

#[derive(Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct HealthCheckResponse {
    status: String,
    uptime: String,
    timestamp: String,
    start_at: String,
    database: String,
    storage: String,
    indexed_images: usize,
    version: String,
    memory_usage: String,
    system: SystemInfo,
}

static LAST_CHECK: AtomicI64 = AtomicI64::new(0);
static CACHED_STATUS: Lazy<RwLock<HealthCheckResponse>> = Lazy::new(||
    RwLock::new(HealthCheckResponse::default())
);

async fn build_health_response(state: &web::Data<AppState>) -> HealthCheckResponse {
    let now_utc = Utc::now();
    let uptime_secs = now_utc.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;
    let human_uptime = format_duration(Duration::from_secs(uptime_secs));

    let mut sys = System::new_all();
    sys.refresh_all();

    let system_info = SystemInfo {
        os: System::name().unwrap_or_else(|| "Unknown".to_string()),
        kernel: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        cpu_count: sys.cpus().len(),
        memory_total: format!("{:.2} GB", sys.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0),
    };

    let db_timeout = Duration::from_secs(state.config.db_timeout_secs.max(1));
    let db_status = match tokio::time::timeout(db_timeout, state.metadata_repo.check_connection()).await {
        Ok(Ok(())) => "OK",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "database health check failed");
            "Unavailable"
        }
        Err(_) => "Timeout",
    };

    let storage_status = match state.storage.check_writable().await {
        Ok(()) => "OK",
        Err(e) => {
            tracing::warn!(error = %e, "upload directory is not writable");
            "Unwritable"
        }
    };

    let process = sysinfo::get_current_pid().ok().and_then(|pid| sys.process(pid));
    let memory_usage = process.map_or("Unknown".to_string(), |p|
        format!("{:.2} MB", p.memory() as f64 / 1024.0 / 1024.0)
    );

    let healthy = db_status == "OK" && storage_status == "OK";

    HealthCheckResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        uptime: human_uptime.to_string(),
        timestamp: now_utc.to_rfc3339(),
        start_at: START_TIME.to_rfc3339(),
        database: db_status.to_string(),
        storage: storage_status.to_string(),
        indexed_images: state.storage.indexed_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        memory_usage,
        system: system_info,
    }
}

fn health_http_response(response: HealthCheckResponse) -> HttpResponse {
    let mut builder = if response.status == "healthy" {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    builder.json(ApiResponse::ok(response))
}

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now = Utc::now().timestamp();
    let last = LAST_CHECK.load(Ordering::Relaxed);

    if now - last > HEALTH_CACHE_SECS {
        let response = build_health_response(&state).await;

        if let Ok(mut cache) = CACHED_STATUS.write() {
            *cache = response.clone();
            LAST_CHECK.store(now, Ordering::Relaxed);
        }

        health_http_response(response)
    } else {
        let cached = CACHED_STATUS
            .read()
            .map(|response| response.clone())
            .map_err(|e| e.to_string());
        match cached {
            Ok(response) => health_http_response(response),
            Err(e) => {
                tracing::warn!("HealthCheck cache lock poisoned: {}", e);
                health_http_response(build_health_response(&state).await)
            }
        }
    }
}

/// Asset counts and byte totals per category and status.
#[instrument(skip(_claims, state))]
pub async fn admin_dashboard(
    _claims: AdminClaims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stats = state.image_handler.storage_stats().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats)))
}
