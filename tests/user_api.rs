mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_obtain_token_and_manage_profile() {
    let app = TestApp::new().await;

    let (status, body) = app
        .api(
            Method::POST,
            "/api/users/",
            None,
            Some(json!({"email": "kari@EXAMPLE.com", "password": "secret1", "name": "Kari"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"email": "kari@example.com", "name": "Kari"}));

    let (status, _) = app
        .api(
            Method::POST,
            "/api/users/",
            None,
            Some(json!({"email": "kari@example.com", "password": "secret1", "name": "Again"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .api(
            Method::POST,
            "/api/token/",
            None,
            Some(json!({"email": "kari@example.com", "password": "nope"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .api(
            Method::POST,
            "/api/token/",
            None,
            Some(json!({"email": "kari@example.com", "password": "secret1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.api(Method::GET, "/api/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Kari");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let (status, body) = app
        .api(Method::PATCH, "/api/me/", Some(&token), Some(json!({"name": "Kari N."})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Kari N.");
    assert_eq!(body["email"], "kari@example.com");

    let (status, _) = app
        .api(Method::PUT, "/api/me/", Some(&token), Some(json!({"name": "Only name"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_short_passwords_and_missing_email() {
    let app = TestApp::new().await;

    let (status, _) = app
        .api(
            Method::POST,
            "/api/users/",
            None,
            Some(json!({"email": "kari@example.com", "password": "pw", "name": "Kari"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .api(
            Method::POST,
            "/api/users/",
            None,
            Some(json!({"email": "", "password": "secret1", "name": "Kari"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_requires_authentication() {
    let app = TestApp::new().await;
    let (status, _) = app.api(Method::GET, "/api/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
