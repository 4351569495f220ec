//! Server-rendered pages. Templates and static files are compiled into the binary.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Request, StatusCode},
    middleware::{self as axum_middleware, Next},
    response::{Html, IntoResponse, Response},
    Router,
};
use rust_embed::RustEmbed;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Context, Tera, Value};
use tracing::error;

use crate::web::middleware::{auth, i18n::Locale};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

pub mod recipe_pages;
pub mod user_pages;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

#[derive(RustEmbed)]
#[folder = "static/"]
struct StaticAssets;

/// Loads every embedded template and registers the `t(key=..., locale=...)` helper.
pub fn load_templates() -> Result<Tera, AppError> {
    let mut sources = Vec::new();
    for name in Templates::iter() {
        let Some(file) = Templates::get(&name) else {
            continue;
        };
        let body = String::from_utf8(file.data.into_owned())
            .map_err(|e| AppError::TemplateError(format!("{name} is not valid UTF-8: {e}")))?;
        sources.push((name.to_string(), body));
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(sources)?;
    tera.register_function("t", translate);
    Ok(tera)
}

fn translate(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let key = args
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("t() requires a string `key`"))?;
    let locale = args.get("locale").and_then(Value::as_str).unwrap_or("en");
    Ok(Value::String(t!(key, locale = locale).into_owned()))
}

/// Context shared by every page: the active locale and the session user.
pub fn base_context(locale: &Locale, user: &Option<AuthenticatedUser>) -> Context {
    let mut context = Context::new();
    context.insert("locale", locale.as_str());
    context.insert("logged_in", &user.is_some());
    context.insert("user_email", &user.as_ref().map(|u| u.email.as_str()));
    context
}

pub fn render(state: &AppState, template: &str, context: &Context) -> Result<Html<String>, AppError> {
    Ok(Html(state.templates.render(template, context)?))
}

pub fn render_with_status(
    state: &AppState,
    status: StatusCode,
    template: &str,
    context: &Context,
) -> Result<Response, AppError> {
    Ok((status, render(state, template, context)?).into_response())
}

pub async fn static_asset_handler(Path(path): Path<String>) -> Response {
    match StaticAssets::get(&path) {
        Some(file) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            Response::builder()
                .header(header::CONTENT_TYPE, mime.as_ref())
                .body(Body::from(file.data.into_owned()))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn error_message_key(status: StatusCode) -> &'static str {
    match status {
        StatusCode::FORBIDDEN => "error.forbidden",
        StatusCode::NOT_FOUND => "error.not_found",
        s if s.is_server_error() => "error.server",
        _ => "error.bad_request",
    }
}

/// Replaces the body of a failed page request with the rendered error page.
/// Responses that already are HTML, such as a form re-rendered with errors, pass through.
pub async fn html_error_pages(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let locale = req
        .extensions()
        .get::<Locale>()
        .cloned()
        .unwrap_or_else(|| Locale("en".to_string()));
    let user = req.extensions().get::<Option<AuthenticatedUser>>().cloned().flatten();

    let response = next.run(req).await;
    let status = response.status();
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if !(status.is_client_error() || status.is_server_error()) || is_html {
        return response;
    }

    let mut context = base_context(&locale, &user);
    context.insert(
        "heading",
        &t!("error.heading", locale = locale.as_str(), status = status.as_u16()).into_owned(),
    );
    context.insert("message_key", error_message_key(status));
    render_with_status(&state, status, "error.html", &context).unwrap_or_else(|e| {
        error!(error = %e, "Failed to render the error page.");
        status.into_response()
    })
}

/// Page routes. Every page sees the session user; pages that need one redirect to login.
pub fn create_page_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = recipe_pages::protected_routes().route_layer(axum_middleware::from_fn(auth::require_login));

    Router::new()
        .merge(recipe_pages::public_routes())
        .merge(user_pages::routes())
        .merge(protected)
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), html_error_pages))
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::session_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_compile() {
        let tera = load_templates().unwrap();
        let names: Vec<&str> = tera.get_template_names().collect();
        assert!(names.contains(&"base.html"));
        assert!(names.contains(&"recipe/recipes.html"));
        assert!(names.contains(&"user/login.html"));
    }

    #[test]
    fn translate_helper_uses_locale() {
        let mut args = HashMap::new();
        args.insert("key".to_string(), Value::String("quick_add.added".to_string()));
        args.insert("locale".to_string(), Value::String("nb".to_string()));
        assert_eq!(translate(&args).unwrap(), Value::String("Lagt til".to_string()));
    }

    #[test]
    fn error_pages_pick_a_message_per_status() {
        assert_eq!(error_message_key(StatusCode::NOT_FOUND), "error.not_found");
        assert_eq!(error_message_key(StatusCode::FORBIDDEN), "error.forbidden");
        assert_eq!(error_message_key(StatusCode::BAD_REQUEST), "error.bad_request");
        assert_eq!(error_message_key(StatusCode::INTERNAL_SERVER_ERROR), "error.server");
    }

    #[test]
    fn serves_embedded_script() {
        assert!(StaticAssets::get("js/add_items.js").is_some());
    }
}
