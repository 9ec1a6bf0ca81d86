use actix_web::{
    http::header::{self, HeaderValue},
    web, HttpRequest, HttpResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    constants::CACHE_CONTROL_IMMUTABLE,
    entities::{metadata::UpdateImageMetadataRequest, response::ApiResponse},
    errors::AppError,
    use_cases::{
        delivery::{etag_matches, DeliveryFile},
        extractors::EditorClaims,
        images::ListImagesQuery,
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct OptimizedQuery {
    pub size: Option<String>,
    pub format: Option<String>,
}

fn header_str<'a>(req: &'a HttpRequest, name: header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Cached file response; answers 304 when the client already holds this version.
async fn serve_file(req: &HttpRequest, file: DeliveryFile, vary_accept: bool) -> Result<HttpResponse, AppError> {
    let not_modified = header_str(req, header::IF_NONE_MATCH)
        .map(|inm| etag_matches(inm, &file.etag))
        .unwrap_or(false);

    let mut builder = if not_modified {
        HttpResponse::NotModified()
    } else {
        HttpResponse::Ok()
    };
    builder
        .insert_header((header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_IMMUTABLE)))
        .insert_header((header::ETAG, file.etag.clone()));
    if vary_accept {
        builder.insert_header((header::VARY, HeaderValue::from_static("Accept")));
    }

    if not_modified {
        return Ok(builder.finish());
    }

    let bytes = tokio::fs::read(&file.path).await?;
    Ok(builder.content_type(file.content_type).body(bytes))
}

#[instrument(skip(_claims, state, query))]
pub async fn list_images(
    _claims: EditorClaims,
    state: web::Data<AppState>,
    query: web::Query<ListImagesQuery>,
) -> Result<HttpResponse, AppError> {
    let page = state.image_handler.list_images(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(page)))
}

#[instrument(skip(state))]
pub async fn get_image_info(
    filename: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let info = state.image_handler.get_info(&filename).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(info)))
}

#[instrument(skip(req, state, query))]
pub async fn get_optimized_image(
    req: HttpRequest,
    filename: web::Path<String>,
    state: web::Data<AppState>,
    query: web::Query<OptimizedQuery>,
) -> Result<HttpResponse, AppError> {
    let file = state
        .image_handler
        .resolve_delivery(
            &filename,
            query.size.as_deref(),
            query.format.as_deref(),
            header_str(&req, header::ACCEPT),
        )
        .await?;

    serve_file(&req, file, true).await
}

#[instrument(skip(req, state))]
pub async fn get_original_image(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (category, filename) = path.into_inner();
    let file = state.image_handler.resolve_original(&category, &filename).await?;
    serve_file(&req, file, false).await
}

#[instrument(skip(_claims, state, body))]
pub async fn update_image_metadata(
    _claims: EditorClaims,
    filename: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<UpdateImageMetadataRequest>,
) -> Result<HttpResponse, AppError> {
    let info = state
        .image_handler
        .update_metadata(&filename, &body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(info).with_message("Metadata updated successfully")))
}

#[instrument(skip(_claims, state))]
pub async fn get_image_references(
    _claims: EditorClaims,
    filename: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let report = state.image_handler.find_references(&filename).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

#[instrument(skip(claims, state), fields(user = %claims.0.sub))]
pub async fn delete_image(
    claims: EditorClaims,
    filename: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let deleted = state.image_handler.delete_image(&filename).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(deleted).with_message("Image deleted successfully")))
}
