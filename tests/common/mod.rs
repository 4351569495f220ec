#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use recipe_hub::db::{self, entities::recipe, services};
use recipe_hub::server::config::ServerConfig;
use recipe_hub::services::auth_service;
use recipe_hub::web::{create_axum_router, AppState};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestUser {
    pub id: i32,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub media: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::with_secret(TEST_SECRET);
        config.database_url = "sqlite::memory:".to_string();
        config.media_dir = media.path().to_string_lossy().into_owned();
        let config = Arc::new(config);

        let db = db::connect(&config.database_url).await.unwrap();
        db::init_schema(&db).await.unwrap();

        let state = AppState::new(db.clone(), config.clone()).unwrap();
        TestApp {
            router: create_axum_router(state),
            db,
            config,
            media,
        }
    }

    /// Inserts a user directly (skipping bcrypt) and mints a session token for it.
    pub async fn user(&self, email: &str) -> TestUser {
        let user = services::create_user(&self.db, email, "Test Cook", "not-a-real-hash")
            .await
            .unwrap();
        let token = auth_service::create_jwt_for_user(&user, TEST_SECRET, 1).unwrap();
        TestUser {
            id: user.id,
            email: user.email,
            token,
        }
    }

    pub async fn tag(&self, user: &TestUser, name: &str) -> i32 {
        services::create_attribute::<recipe_hub::db::entities::tag::Entity, _>(&self.db, user.id, name)
            .await
            .unwrap()
            .id
    }

    pub async fn ingredient(&self, user: &TestUser, name: &str) -> i32 {
        services::create_attribute::<recipe_hub::db::entities::ingredient::Entity, _>(&self.db, user.id, name)
            .await
            .unwrap()
            .id
    }

    pub async fn recipe(&self, user: &TestUser, title: &str, tag_ids: &[i32], ingredient_ids: &[i32]) -> recipe::Model {
        let links = services::RecipeLinks {
            tags: Some(services::LinkSet::Ids(tag_ids.to_vec())),
            ingredients: Some(services::LinkSet::Ids(ingredient_ids.to_vec())),
        };
        services::create_recipe(&self.db, user.id, title, "Some description", &links)
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON API call authenticated with `Authorization: Bearer`.
    pub async fn api(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Page request carrying the session cookie, as a browser would send it.
    pub async fn page(&self, method: Method, uri: &str, token: Option<&str>, form: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={token}"));
        }
        let request = match form {
            Some(form) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Parses the body as JSON; an empty body becomes `Value::Null`.
pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}
