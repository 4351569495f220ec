use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tera::Tera;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::db::entities::{ingredient, tag};
use crate::server::config::ServerConfig;
use crate::web::middleware::i18n::i18n_middleware;
use crate::web::routes::*;

pub mod error;
pub mod middleware;
pub mod models;
pub mod pages;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Result<Arc<Self>, AppError> {
        Ok(Arc::new(AppState {
            db_pool,
            config,
            templates: Arc::new(pages::load_templates()?),
        }))
    }
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(user_routes::create_user_router(app_state.clone()))
        .merge(recipe_routes::create_recipe_router(app_state.clone()))
        .merge(attribute_routes::create_attribute_router::<tag::Entity>("/api/tags", app_state.clone()))
        .merge(attribute_routes::create_attribute_router::<ingredient::Entity>(
            "/api/ingredients",
            app_state.clone(),
        ))
        .merge(quick_add_routes::create_quick_add_router(app_state.clone()))
        .merge(pages::create_page_router(app_state.clone()))
        .route("/static/{*path}", get(pages::static_asset_handler))
        .nest_service("/media", ServeDir::new(&app_state.config.media_dir))
        .layer(axum_middleware::from_fn(i18n_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
