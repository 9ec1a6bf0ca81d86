use actix_web::{http::StatusCode, HttpResponse};

use crate::entities::response::ApiResponse;

pub fn json_error(status: StatusCode, error: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::failure(error, message))
}

/// Fallback for unmatched routes.
pub async fn route_not_found() -> HttpResponse {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found")
}
