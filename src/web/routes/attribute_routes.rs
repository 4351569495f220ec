//! Shared routes for user-owned recipe attributes (`/api/tags/`, `/api/ingredients/`).
//! Creation goes through the quick-add endpoint; here attributes are listed, read,
//! renamed and deleted.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use crate::db::services::{self, Attribute, RecipeAttribute};
use crate::web::middleware::auth;
use crate::web::models::recipe_models::{AttributeListQuery, AttributePayload};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

/// `assigned_only` is an integer flag; any non-zero value enables it.
fn parse_assigned_only(raw: Option<&str>) -> Result<bool, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some(value) => value
            .parse::<i64>()
            .map(|flag| flag != 0)
            .map_err(|_| AppError::InvalidInput("assigned_only must be 0 or 1.".to_string())),
    }
}

fn not_found<E: RecipeAttribute>() -> AppError {
    AppError::NotFound(format!("No {} found with this id.", E::KIND))
}

// --- Route Handlers ---

async fn list_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<AttributeListQuery>,
) -> Result<Json<Vec<Attribute>>, AppError> {
    let assigned_only = parse_assigned_only(params.assigned_only.as_deref())?;
    let items = services::list_attributes::<E, _>(&app_state.db_pool, authenticated_user.id, assigned_only).await?;
    Ok(Json(items))
}

async fn get_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(attribute_id): Path<i32>,
) -> Result<Json<Attribute>, AppError> {
    services::get_attribute::<E, _>(&app_state.db_pool, authenticated_user.id, attribute_id)
        .await?
        .map(Json)
        .ok_or_else(not_found::<E>)
}

/// Serves both PUT and PATCH: `name` is the only writable field.
async fn update_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(attribute_id): Path<i32>,
    Json(payload): Json<AttributePayload>,
) -> Result<Json<Attribute>, AppError> {
    let name = payload.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::InvalidInput("name may not be blank.".to_string()));
    }
    services::rename_attribute::<E, _>(&app_state.db_pool, authenticated_user.id, attribute_id, name)
        .await?
        .map(Json)
        .ok_or_else(not_found::<E>)
}

async fn delete_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(attribute_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = services::delete_attribute::<E, _>(&app_state.db_pool, authenticated_user.id, attribute_id).await?;
    if !deleted {
        return Err(not_found::<E>());
    }
    info!(user_id = authenticated_user.id, attribute_id, kind = E::KIND, "Attribute deleted.");
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

/// Routes for one attribute kind mounted at `base_path` (e.g. `/api/tags`).
pub fn create_attribute_router<E>(base_path: &str, app_state: Arc<AppState>) -> Router<Arc<AppState>>
where
    E: RecipeAttribute + Send + Sync + 'static,
{
    Router::new()
        .route(&format!("{base_path}/"), get(list_handler::<E>))
        .route(
            &format!("{base_path}/{{attribute_id}}/"),
            get(get_handler::<E>)
                .put(update_handler::<E>)
                .patch(update_handler::<E>)
                .delete(delete_handler::<E>),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth))
}
