
use image::GenericImageView;
use reqwest::{header, StatusCode};
use test_utils::TestApp;

impl TestApp {
    async fn optimized(&self, filename: &str, query: &str, accept: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .get(self.url(&format!("/api/v1/images/{}/optimized?{}", filename, query)));
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        request.send().await.unwrap()
    }
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_rt::test]
async fn medium_variant_is_served_as_webp_when_accepted() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(2000, 1500).await;

    let response = app
        .optimized(&filename, "size=medium", Some("image/avif,image/webp,*/*;q=0.8"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/webp");

    let bytes = response.bytes().await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (800, 600));
}

#[actix_rt::test]
async fn jpeg_is_served_without_webp_support() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(2000, 1500).await;

    let response = app.optimized(&filename, "size=small", Some("image/*")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/jpeg");

    let bytes = response.bytes().await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (400, 300));

    let response = app
        .optimized(&filename, "size=thumbnail&format=jpeg", Some("image/webp"))
        .await;
    assert_eq!(content_type(&response), "image/jpeg");
}

#[actix_rt::test]
async fn responses_carry_cache_validators() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(300, 200).await;

    let response = app.optimized(&filename, "size=thumbnail", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=31536000");
    assert_eq!(headers[header::VARY], "Accept");
    let etag = headers[header::ETAG].to_str().unwrap().to_string();
    assert!(etag.starts_with('"'));

    let response = app
        .client
        .get(app.url(&format!("/api/v1/images/{}/optimized?size=thumbnail", filename)))
        .header(header::IF_NONE_MATCH, &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
}

#[actix_rt::test]
async fn small_sources_are_never_upscaled() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(100, 80).await;

    let response = app.optimized(&filename, "size=large&format=jpeg", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.bytes().await.unwrap();
    let (width, height) = image::load_from_memory(&bytes).unwrap().dimensions();
    assert!(width <= 100 && height <= 80, "{width}x{height}");
}

#[actix_rt::test]
async fn missing_variant_falls_back_to_original() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(640, 480).await;

    let stem = filename.trim_end_matches(".jpg");
    let variant = app
        .upload_dir
        .path()
        .join("processed")
        .join(format!("{}-medium.webp", stem));
    std::fs::remove_file(&variant).unwrap();

    let response = app.optimized(&filename, "size=medium&format=webp", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/jpeg");

    let bytes = response.bytes().await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (640, 480));
}

#[actix_rt::test]
async fn invalid_size_or_format_is_rejected() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(64, 64).await;

    let response = app.optimized(&filename, "size=huge", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_INPUT");

    let response = app.optimized(&filename, "format=gif", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.optimized("image-1-123456789.jpg", "size=small", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn originals_are_served_from_the_public_path() {
    let app = TestApp::spawn().await;
    let filename = app.upload_jpeg(120, 90).await;

    let response = app
        .client
        .get(app.url(&format!("/uploads/images/{}", filename)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/jpeg");
    assert!(response.headers().contains_key(header::ETAG));
    assert!(!response.headers().contains_key(header::VARY));

    let on_disk = std::fs::read(app.upload_dir.path().join("images").join(&filename)).unwrap();
    assert_eq!(response.bytes().await.unwrap().as_ref(), on_disk.as_slice());

    let response = app
        .client
        .get(app.url("/uploads/images/image-1-123456789.jpg"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .client
        .get(app.url(&format!("/uploads/videos/{}", filename)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
