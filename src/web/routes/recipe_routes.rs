use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::{ingredient, recipe, tag};
use crate::db::services::{
    self, filters::parse_id_list, LinkSet, RecipeAttribute, RecipeChanges, RecipeFilter, RecipeLinks,
};
use crate::services::image_storage;
use crate::web::middleware::auth;
use crate::web::models::recipe_models::{
    NamePayload, RecipeDetail, RecipeImageResponse, RecipeListQuery, RecipePayload, RecipeSummary,
};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

const MAX_TITLE_LENGTH: usize = 255;

// --- Helpers ---

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title may not be blank.".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "title may not be longer than {MAX_TITLE_LENGTH} characters."
        )));
    }
    Ok(title.to_string())
}

/// Checks nested `{name}` entries. Nothing is written here; the names are
/// resolved inside the recipe's transaction.
fn link_names<E: RecipeAttribute>(names: Option<Vec<NamePayload>>) -> Result<Option<LinkSet>, AppError> {
    let Some(names) = names else {
        return Ok(None);
    };
    let mut checked = Vec::with_capacity(names.len());
    for entry in names {
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(format!("{} name may not be blank.", E::KIND)));
        }
        checked.push(name.to_string());
    }
    Ok(Some(LinkSet::Names(checked)))
}

fn requested_links(
    tags: Option<Vec<NamePayload>>,
    ingredients: Option<Vec<NamePayload>>,
) -> Result<RecipeLinks, AppError> {
    Ok(RecipeLinks {
        tags: link_names::<tag::Entity>(tags)?,
        ingredients: link_names::<ingredient::Entity>(ingredients)?,
    })
}

async fn detail_of(db: &DatabaseConnection, recipe: recipe::Model) -> Result<RecipeDetail, AppError> {
    Ok(services::load_attributes(db, recipe).await?.into())
}

async fn owned_recipe(db: &DatabaseConnection, user_id: i32, recipe_id: i32) -> Result<recipe::Model, AppError> {
    services::get_recipe_for_user(db, user_id, recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))
}

// --- Route Handlers ---

async fn list_recipes_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<RecipeListQuery>,
) -> Result<Json<Vec<RecipeSummary>>, AppError> {
    let filter = RecipeFilter {
        tag_ids: parse_id_list(params.tags.as_deref().unwrap_or_default()).map_err(AppError::InvalidInput)?,
        ingredient_ids: parse_id_list(params.ingredients.as_deref().unwrap_or_default())
            .map_err(AppError::InvalidInput)?,
    };
    let recipes = services::list_recipes_for_user(&app_state.db_pool, authenticated_user.id, &filter).await?;
    let loaded = services::with_attributes(&app_state.db_pool, recipes).await?;
    Ok(Json(loaded.into_iter().map(RecipeSummary::from).collect()))
}

async fn create_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeDetail>), AppError> {
    let db = &app_state.db_pool;
    let title = validate_title(payload.title.as_deref().unwrap_or_default())?;
    let description = payload.description.unwrap_or_default();
    let links = requested_links(payload.tags, payload.ingredients)?;

    let created = services::create_recipe(db, authenticated_user.id, &title, &description, &links).await?;
    info!(user_id = authenticated_user.id, recipe_id = created.id, "Recipe created.");
    Ok((StatusCode::CREATED, Json(detail_of(db, created).await?)))
}

async fn get_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
) -> Result<Json<RecipeDetail>, AppError> {
    let recipe = owned_recipe(&app_state.db_pool, authenticated_user.id, recipe_id).await?;
    Ok(Json(detail_of(&app_state.db_pool, recipe).await?))
}

async fn update_recipe(
    app_state: &AppState,
    user_id: i32,
    recipe_id: i32,
    payload: RecipePayload,
    partial: bool,
) -> Result<RecipeDetail, AppError> {
    let db = &app_state.db_pool;
    let existing = owned_recipe(db, user_id, recipe_id).await?;

    if !partial && payload.title.is_none() {
        return Err(AppError::InvalidInput("title is required.".to_string()));
    }
    let changes = RecipeChanges {
        title: payload.title.as_deref().map(validate_title).transpose()?,
        description: payload.description,
    };
    let links = requested_links(payload.tags, payload.ingredients)?;

    let updated = services::update_recipe(db, existing, changes, &links).await?;
    info!(user_id, recipe_id, partial, "Recipe updated.");
    detail_of(db, updated).await
}

async fn put_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
    Json(payload): Json<RecipePayload>,
) -> Result<Json<RecipeDetail>, AppError> {
    update_recipe(&app_state, authenticated_user.id, recipe_id, payload, false)
        .await
        .map(Json)
}

async fn patch_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
    Json(payload): Json<RecipePayload>,
) -> Result<Json<RecipeDetail>, AppError> {
    update_recipe(&app_state, authenticated_user.id, recipe_id, payload, true)
        .await
        .map(Json)
}

async fn delete_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = services::delete_recipe_for_user(&app_state.db_pool, authenticated_user.id, recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))?;

    if let Some(image) = &deleted.image {
        image_storage::remove_image(FsPath::new(&app_state.config.media_dir), image).await;
    }
    info!(user_id = authenticated_user.id, recipe_id, "Recipe deleted.");
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_image_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<RecipeImageResponse>, AppError> {
    let db = &app_state.db_pool;
    let existing = owned_recipe(db, authenticated_user.id, recipe_id).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {e}")))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| AppError::InvalidInput("No image was submitted.".to_string()))?;

    let media_dir = FsPath::new(&app_state.config.media_dir);
    let stored = image_storage::save_recipe_image(media_dir, &bytes).await?;
    let previous = existing.image.clone();
    let persist = services::set_recipe_image(db, existing, Some(stored.clone()));
    let updated = image_storage::keep_if_persisted(media_dir, &stored, persist).await?;
    if let Some(previous) = previous {
        image_storage::remove_image(media_dir, &previous).await;
    }

    Ok(Json(RecipeImageResponse {
        id: updated.id,
        image: updated.image.as_deref().map(image_storage::public_url),
    }))
}

// --- Router ---

pub fn create_recipe_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = app_state.config.max_upload_bytes;
    Router::new()
        .route("/api/recipes/", get(list_recipes_handler).post(create_recipe_handler))
        .route(
            "/api/recipes/{recipe_id}/",
            get(get_recipe_handler)
                .put(put_recipe_handler)
                .patch(patch_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route(
            "/api/recipes/{recipe_id}/upload-image/",
            post(upload_image_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_nested_name_is_rejected_before_any_write() {
        let names = vec![
            NamePayload { name: "Indian".to_string() },
            NamePayload { name: "   ".to_string() },
        ];
        assert!(requested_links(None, Some(names)).is_err());
    }

    #[test]
    fn nested_names_are_trimmed_and_omitted_lists_kept() {
        let links = requested_links(Some(vec![NamePayload { name: " Curry ".to_string() }]), None).unwrap();
        assert_eq!(links.tags, Some(LinkSet::Names(vec!["Curry".to_string()])));
        assert!(links.ingredients.is_none());
    }

    #[test]
    fn trims_and_bounds_titles() {
        assert_eq!(validate_title("  Pancakes ").unwrap(), "Pancakes");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH)).is_ok());
    }
}
