
use reqwest::StatusCode;
use serde_json::Value;
use test_utils::TestApp;

#[actix_rt::test]
async fn home_returns_banner() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"], "Newsdesk Media API");
    assert_eq!(body["data"]["api"], "/api/v1");
}

#[actix_rt::test]
async fn health_reports_database_and_storage() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(data["status"], "healthy");
    assert_eq!(data["database"], "OK");
    assert_eq!(data["storage"], "OK");
    assert!(data["uptime"].is_string());
}

#[actix_rt::test]
async fn unknown_route_returns_json_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/v1/nothing-here"))
        .bearer_auth(app.editor_token())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[actix_rt::test]
async fn protected_routes_reject_bad_tokens() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/v1/images"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
