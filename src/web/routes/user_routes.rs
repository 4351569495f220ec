use axum::{
    extract::{Extension, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::db::services;
use crate::services::auth_service;
use crate::web::middleware::auth;
use crate::web::models::{
    AuthenticatedUser, RegisterRequest, TokenRequest, TokenResponse, UpdateUserRequest, UserResponse,
};
use crate::web::{AppError, AppState};

async fn create_user_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = auth_service::register_user(&app_state.db_pool, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn token_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = auth_service::authenticate(&app_state.db_pool, &payload.email, &payload.password).await?;
    let token = auth_service::create_jwt_for_user(
        &user,
        &app_state.config.jwt_secret,
        app_state.config.token_ttl_hours,
    )?;
    Ok(Json(TokenResponse { token }))
}

async fn me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::get_user_by_id(&app_state.db_pool, authenticated_user.id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.into()))
}

async fn update_me(
    app_state: &AppState,
    user_id: i32,
    payload: UpdateUserRequest,
    partial: bool,
) -> Result<UserResponse, AppError> {
    let user = services::get_user_by_id(&app_state.db_pool, user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    let updated = auth_service::update_profile(&app_state.db_pool, user, payload, partial).await?;
    Ok(updated.into())
}

async fn put_me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    update_me(&app_state, authenticated_user.id, payload, false).await.map(Json)
}

async fn patch_me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    update_me(&app_state, authenticated_user.id, payload, true).await.map(Json)
}

pub fn create_user_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let me = Router::new()
        .route(
            "/api/me/",
            get(me_handler).put(put_me_handler).patch(patch_me_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth));

    Router::new()
        .route("/api/users/", post(create_user_handler))
        .route("/api/token/", post(token_handler))
        .merge(me)
}
