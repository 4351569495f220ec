use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppState, error::AppError};

/// Name of the cookie carrying the session token for page requests.
pub const SESSION_COOKIE: &str = "token";

/// Token from `Authorization: Bearer|Token <jwt>`, falling back to the session cookie.
fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("Token "))
        })
        .map(|s| s.trim().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

fn resolve_user(state: &AppState, headers: &HeaderMap, jar: &CookieJar) -> Result<AuthenticatedUser, AppError> {
    let token = extract_token(headers, jar).ok_or(AppError::InvalidCredentials)?;
    let claims = auth_service::decode_jwt(&token, &state.config.jwt_secret)?;
    Ok(AuthenticatedUser {
        id: claims.user_id,
        email: claims.sub,
    })
}

/// API guard: rejects the request with 401 unless it carries a valid token.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let authenticated_user = resolve_user(&state, req.headers(), &jar)?;
    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}

/// Page layer: records the session user, if any, as `Option<AuthenticatedUser>`.
pub async fn session_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Response {
    let user = resolve_user(&state, req.headers(), &jar).ok();
    if let Some(user) = &user {
        req.extensions_mut().insert(user.clone());
    }
    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Page guard: sends anonymous visitors to the login page, remembering where they were going.
/// Must run inside `session_user`.
pub async fn require_login(req: Request<AxumBody>, next: Next) -> Response {
    let logged_in = matches!(req.extensions().get::<Option<AuthenticatedUser>>(), Some(Some(_)));
    if logged_in {
        return next.run(req).await;
    }
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&format!("/user/login/?next={}", urlencoding::encode(&target))).into_response()
}
