use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use crate::{
    api_errors::UploadError,
    entities::response::ApiResponse,
    limiter::rate_limiter::RateDecision,
    use_cases::{extractors::EditorClaims, uploads::UploadMode},
    utils::get_client_ip::get_client_ip,
    AppState,
};

fn check_rate_limit(req: &HttpRequest, state: &AppState) -> Result<(), UploadError> {
    let client = get_client_ip(req, state.config.trust_forwarded_for);
    match state.upload_limiter.check(&client) {
        RateDecision::Allowed { .. } => Ok(()),
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(client = %client, retry_after_secs, "upload rate limit hit");
            Err(UploadError::RateLimited(retry_after_secs))
        }
    }
}

#[instrument(skip(claims, req, state, payload), fields(user = %claims.0.sub))]
pub async fn upload_single(
    claims: EditorClaims,
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, UploadError> {
    check_rate_limit(&req, &state)?;

    let mut uploaded = state
        .upload_handler
        .accept(payload, UploadMode::Single)
        .await?;

    let image = uploaded.pop().ok_or(UploadError::NoFile)?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(image).with_message("File uploaded successfully")))
}

#[instrument(skip(claims, req, state, payload), fields(user = %claims.0.sub))]
pub async fn upload_multiple(
    claims: EditorClaims,
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, UploadError> {
    check_rate_limit(&req, &state)?;

    let uploaded = state
        .upload_handler
        .accept(payload, UploadMode::Multiple)
        .await?;

    let message = format!("{} files uploaded successfully", uploaded.len());
    Ok(HttpResponse::Created().json(ApiResponse::ok(uploaded).with_message(message)))
}
