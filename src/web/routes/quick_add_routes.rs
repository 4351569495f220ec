//! `POST /recipe/additem/`: lightweight tag/ingredient creation used by the recipe forms.

use axum::{
    body::Body as AxumBody,
    extract::{Extension, Form, FromRequest, State},
    http::{header, Request, StatusCode},
    middleware as axum_middleware,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::db::entities::{ingredient, tag};
use crate::db::services;
use crate::web::middleware::{auth, i18n::Locale};
use crate::web::models::recipe_models::QuickAddRequest;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

fn is_json(req: &Request<AxumBody>) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Reads the body as JSON or as a urlencoded form, depending on `Content-Type`.
async fn read_request(state: &Arc<AppState>, req: Request<AxumBody>) -> Result<QuickAddRequest, AppError> {
    if is_json(&req) {
        let Json(body) = Json::<QuickAddRequest>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        Ok(body)
    } else {
        let Form(body) = Form::<QuickAddRequest>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        Ok(body)
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": text.into() })))
}

async fn add_item_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    State(app_state): State<Arc<AppState>>,
    req: Request<AxumBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let payload = read_request(&app_state, req).await?;
    let locale = locale.as_str();

    let value = payload.value.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(message(
            StatusCode::BAD_REQUEST,
            t!("quick_add.missing_value", locale = locale),
        ));
    }

    let db = &app_state.db_pool;
    let created = match payload.item_type.as_deref() {
        Some("ingredient") => services::create_attribute::<ingredient::Entity, _>(db, authenticated_user.id, value).await?,
        Some("tag") => services::create_attribute::<tag::Entity, _>(db, authenticated_user.id, value).await?,
        _ => {
            return Ok(message(
                StatusCode::BAD_REQUEST,
                t!("quick_add.invalid_type", locale = locale),
            ));
        }
    };
    info!(
        user_id = authenticated_user.id,
        attribute_id = created.id,
        kind = payload.item_type.as_deref().unwrap_or_default(),
        "Quick-added attribute."
    );

    Ok(message(StatusCode::CREATED, t!("quick_add.added", locale = locale)))
}

pub fn create_quick_add_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipe/additem/", post(add_item_handler))
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth))
}
