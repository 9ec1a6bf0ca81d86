use actix_web::{get, HttpResponse, Responder};

use crate::entities::response::ApiResponse;

#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
        "service": "Newsdesk Media API",
        "status": "Ok",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "api": "/api/v1"
    })))
}
