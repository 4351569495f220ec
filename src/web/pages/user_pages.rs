use axum::{
    extract::{Extension, Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::services::auth_service;
use crate::web::middleware::auth::SESSION_COOKIE;
use crate::web::middleware::i18n::Locale;
use crate::web::models::{AuthenticatedUser, RegisterRequest};
use crate::web::pages::{base_context, render, render_with_status};
use crate::web::{AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password1: String,
    #[serde(default)]
    password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

/// Only same-site paths are followed after login. Browsers drop tabs and newlines
/// from URLs, so a value containing any control or whitespace character is refused.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(|c| c.is_control() || c.is_whitespace())
    })
}

// --- Signup ---

async fn signup_form_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let mut context = base_context(&locale, &user);
    context.insert("form_name", "");
    context.insert("form_email", "");
    context.insert("errors", &Vec::<String>::new());
    Ok(render(&app_state, "user/user_create.html", &context)?.into_response())
}

async fn signup_submit(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let mut errors = Vec::new();
    if form.password1 != form.password2 {
        errors.push(t!("signup.password_mismatch", locale = locale.as_str()).into_owned());
    } else {
        let request = RegisterRequest {
            email: form.email.clone(),
            password: form.password1.clone(),
            name: form.name.clone(),
        };
        match auth_service::register_user(&app_state.db_pool, request).await {
            Ok(_) => return Ok(Redirect::to("/user/create/confirmed/").into_response()),
            Err(AppError::InvalidInput(msg)) | Err(AppError::UserAlreadyExists(msg)) => errors.push(msg),
            Err(e) => return Err(e),
        }
    }

    let mut context = base_context(&locale, &user);
    context.insert("form_name", &form.name);
    context.insert("form_email", &form.email);
    context.insert("errors", &errors);
    render_with_status(&app_state, StatusCode::BAD_REQUEST, "user/user_create.html", &context)
}

async fn signup_confirmed_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let context = base_context(&locale, &user);
    Ok(render(&app_state, "user/thanks_for_creating_user.html", &context)?.into_response())
}

// --- Login / logout ---

async fn login_form_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let mut context = base_context(&locale, &user);
    context.insert("form_email", "");
    context.insert("next", &safe_next(params.next.as_deref()).unwrap_or_default());
    context.insert("error", &None::<String>);
    Ok(render(&app_state, "user/login.html", &context)?.into_response())
}

async fn login_submit(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());
    let authenticated = match auth_service::authenticate(&app_state.db_pool, &form.email, &form.password).await {
        Ok(authenticated) => authenticated,
        Err(AppError::InvalidCredentials) => {
            let mut context = base_context(&locale, &user);
            context.insert("form_email", &form.email);
            context.insert("next", &next.unwrap_or_default());
            context.insert(
                "error",
                &Some(t!("login.invalid_credentials", locale = locale.as_str()).into_owned()),
            );
            return render_with_status(&app_state, StatusCode::UNAUTHORIZED, "user/login.html", &context);
        }
        Err(e) => return Err(e),
    };

    let token = auth_service::create_jwt_for_user(
        &authenticated,
        &app_state.config.jwt_secret,
        app_state.config.token_ttl_hours,
    )?;
    let session_cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(app_state.config.secure_cookies)
        .build();
    info!(user_id = authenticated.id, "User logged in.");

    let destination = next.unwrap_or(app_state.config.login_redirect_url.as_str()).to_string();
    Ok((jar.add(session_cookie), Redirect::to(&destination)).into_response())
}

async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/create/", get(signup_form_page).post(signup_submit))
        .route("/user/create/confirmed/", get(signup_confirmed_page))
        .route("/user/login/", get(login_form_page).post(login_submit))
        .route("/user/logout/", get(logout_handler).post(logout_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(safe_next(Some("/recipe/share/")), Some("/recipe/share/"));
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/\t/evil.example/")), None);
        assert_eq!(safe_next(Some("/\r\n/evil.example/")), None);
        assert_eq!(safe_next(Some("/ /evil.example/")), None);
        assert_eq!(safe_next(Some("/recipe/search/?search=ris%20og%20laks")), Some("/recipe/search/?search=ris%20og%20laks"));
        assert_eq!(safe_next(None), None);
    }
}
