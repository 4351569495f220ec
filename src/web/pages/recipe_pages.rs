use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::Form;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use tera::Context;
use tracing::{info, warn};

use crate::db::entities::{ingredient, recipe, tag};
use crate::db::services::{self, LinkSet, RecipeAttribute, RecipeChanges, RecipeLinks, RecipePage};
use crate::web::middleware::i18n::Locale;
use crate::web::models::recipe_models::RecipeDetail;
use crate::web::models::AuthenticatedUser;
use crate::web::pages::{base_context, render, render_with_status};
use crate::web::{AppError, AppState};

const TOP_INGREDIENT_COUNT: u64 = 5;
const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    search: Option<String>,
}

/// Share/edit form. `tags` and `ingredients` come from multi-selects, so keys repeat.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<i32>,
    #[serde(default)]
    ingredients: Vec<i32>,
}

fn page_not_found() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

/// Blank means page 1; anything that is not a positive integer is a missing page.
fn parse_page(raw: Option<&str>) -> Result<u64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(value) => value.parse::<u64>().ok().filter(|&n| n > 0).ok_or_else(page_not_found),
    }
}

async fn details(db: &DatabaseConnection, recipes: Vec<recipe::Model>) -> Result<Vec<RecipeDetail>, AppError> {
    Ok(services::with_attributes(db, recipes)
        .await?
        .into_iter()
        .map(RecipeDetail::from)
        .collect())
}

async fn insert_page(context: &mut Context, db: &DatabaseConnection, page: RecipePage) -> Result<(), AppError> {
    context.insert("page_number", &page.number);
    context.insert("num_pages", &page.num_pages);
    context.insert("has_previous", &page.has_previous());
    context.insert("has_next", &page.has_next());
    context.insert("total", &page.total);
    context.insert("recipes", &details(db, page.recipes).await?);
    Ok(())
}

// --- Public pages ---

async fn list_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    let page_number = parse_page(params.page.as_deref())?;
    let page = services::paginate_recipes(db, services::all_recipes(), page_number)
        .await?
        .ok_or_else(page_not_found)?;

    let mut context = base_context(&locale, &user);
    insert_page(&mut context, db, page).await?;
    context.insert("top_ingredients", &services::top_ingredients(db, TOP_INGREDIENT_COUNT).await?);
    context.insert("page_query", "");
    Ok(render(&app_state, "recipe/recipes.html", &context)?.into_response())
}

async fn search_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    let search = params.search.unwrap_or_default();
    let page_number = parse_page(params.page.as_deref())?;
    let page = services::paginate_recipes(db, services::search_recipes(&search), page_number)
        .await?
        .ok_or_else(page_not_found)?;

    let mut context = base_context(&locale, &user);
    insert_page(&mut context, db, page).await?;
    context.insert("top_ingredients", &services::top_ingredients(db, TOP_INGREDIENT_COUNT).await?);
    context.insert("search", &search);
    context.insert("page_query", &format!("search={}&", urlencoding::encode(&search)));
    Ok(render(&app_state, "recipe/recipes.html", &context)?.into_response())
}

async fn detail_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    let recipe = services::get_recipe(db, recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))?;
    let can_edit = user.as_ref().is_some_and(|u| u.id == recipe.user_id);

    let mut context = base_context(&locale, &user);
    context.insert("can_edit", &can_edit);
    context.insert("recipe", &RecipeDetail::from(services::load_attributes(db, recipe).await?));
    Ok(render(&app_state, "recipe/detail.html", &context)?.into_response())
}

// --- Share / edit ---

/// Checks a submitted form; error messages are already localized.
async fn validate_form(
    db: &DatabaseConnection,
    user_id: i32,
    form: &RecipeForm,
    locale: &str,
) -> Result<Result<(String, String, RecipeLinks), Vec<String>>, AppError> {
    let mut errors = Vec::new();

    let title = form.title.trim();
    if title.is_empty() {
        errors.push(t!("recipe_form.title_required", locale = locale).into_owned());
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        errors.push(t!("recipe_form.title_too_long", locale = locale, max = MAX_TITLE_LENGTH).into_owned());
    }
    let description = form.description.trim();
    if description.is_empty() {
        errors.push(t!("recipe_form.description_required", locale = locale).into_owned());
    }

    if !all_owned::<tag::Entity>(db, user_id, &form.tags).await? {
        errors.push(t!("recipe_form.invalid_tags", locale = locale).into_owned());
    }
    if !all_owned::<ingredient::Entity>(db, user_id, &form.ingredients).await? {
        errors.push(t!("recipe_form.invalid_ingredients", locale = locale).into_owned());
    }

    if !errors.is_empty() {
        return Ok(Err(errors));
    }
    let links = RecipeLinks {
        tags: Some(LinkSet::Ids(form.tags.clone())),
        ingredients: Some(LinkSet::Ids(form.ingredients.clone())),
    };
    Ok(Ok((title.to_string(), description.to_string(), links)))
}

async fn all_owned<E: RecipeAttribute>(db: &DatabaseConnection, user_id: i32, ids: &[i32]) -> Result<bool, AppError> {
    let mut requested = ids.to_vec();
    requested.sort_unstable();
    requested.dedup();
    let owned = services::owned_attribute_ids::<E, _>(db, user_id, &requested).await?;
    Ok(owned.len() == requested.len())
}

/// Renders the share/edit form with the user's tags and ingredients as choices.
async fn render_form(
    app_state: &AppState,
    context: &mut Context,
    user_id: i32,
    template: &str,
    form: &RecipeForm,
    errors: &[String],
    status: StatusCode,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    context.insert("tags", &services::list_attributes::<tag::Entity, _>(db, user_id, false).await?);
    context.insert(
        "ingredients",
        &services::list_attributes::<ingredient::Entity, _>(db, user_id, false).await?,
    );
    context.insert("form_title", &form.title);
    context.insert("form_description", &form.description);
    context.insert("selected_tags", &form.tags);
    context.insert("selected_ingredients", &form.ingredients);
    context.insert("errors", errors);
    render_with_status(app_state, status, template, context)
}

async fn share_form_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let mut context = base_context(&locale, &user);
    render_form(
        &app_state,
        &mut context,
        authenticated_user.id,
        "recipe/share.html",
        &RecipeForm::default(),
        &[],
        StatusCode::OK,
    )
    .await
}

async fn share_submit(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Form(form): Form<RecipeForm>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    match validate_form(db, authenticated_user.id, &form, locale.as_str()).await? {
        Ok((title, description, links)) => {
            let created = services::create_recipe(db, authenticated_user.id, &title, &description, &links).await?;
            info!(user_id = authenticated_user.id, recipe_id = created.id, "Recipe shared.");
            Ok(Redirect::to("/").into_response())
        }
        Err(errors) => {
            let mut context = base_context(&locale, &user);
            render_form(
                &app_state,
                &mut context,
                authenticated_user.id,
                "recipe/share.html",
                &form,
                &errors,
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    }
}

/// Loads a recipe for editing: missing is 404, someone else's is 403.
async fn editable_recipe(
    db: &DatabaseConnection,
    user: &AuthenticatedUser,
    recipe_id: i32,
) -> Result<recipe::Model, AppError> {
    let recipe = services::get_recipe(db, recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))?;
    if recipe.user_id != user.id {
        warn!(user_id = user.id, recipe_id, "Rejected edit of another user's recipe.");
        return Err(AppError::Forbidden("You can only edit your own recipes.".to_string()));
    }
    Ok(recipe)
}

async fn edit_form_page(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    let recipe = editable_recipe(db, &authenticated_user, recipe_id).await?;
    let loaded = services::load_attributes(db, recipe).await?;
    let form = RecipeForm {
        title: loaded.recipe.title.clone(),
        description: loaded.recipe.description.clone(),
        tags: loaded.tags.iter().map(|a| a.id).collect(),
        ingredients: loaded.ingredients.iter().map(|a| a.id).collect(),
    };

    let mut context = base_context(&locale, &user);
    context.insert("recipe_id", &recipe_id);
    render_form(
        &app_state,
        &mut context,
        authenticated_user.id,
        "recipe/edit_recipe.html",
        &form,
        &[],
        StatusCode::OK,
    )
    .await
}

async fn edit_submit(
    Extension(locale): Extension<Locale>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(recipe_id): Path<i32>,
    Form(form): Form<RecipeForm>,
) -> Result<Response, AppError> {
    let db = &app_state.db_pool;
    let recipe = editable_recipe(db, &authenticated_user, recipe_id).await?;

    match validate_form(db, authenticated_user.id, &form, locale.as_str()).await? {
        Ok((title, description, links)) => {
            let changes = RecipeChanges {
                title: Some(title),
                description: Some(description),
            };
            services::update_recipe(db, recipe, changes, &links).await?;
            info!(user_id = authenticated_user.id, recipe_id, "Recipe edited.");
            Ok(Redirect::to(&format!("/recipe/{recipe_id}/")).into_response())
        }
        Err(errors) => {
            let mut context = base_context(&locale, &user);
            context.insert("recipe_id", &recipe_id);
            render_form(
                &app_state,
                &mut context,
                authenticated_user.id,
                "recipe/edit_recipe.html",
                &form,
                &errors,
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    }
}

// --- Routers ---

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_page))
        .route("/recipe/search/", get(search_page))
        .route("/recipe/{recipe_id}/", get(detail_page))
}

/// Routes that need a logged-in user; the caller adds the login guard.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipe/share/", get(share_form_page).post(share_submit))
        .route("/recipe/{recipe_id}/edit/", get(edit_form_page).post(edit_submit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers() {
        assert_eq!(parse_page(None).unwrap(), 1);
        assert_eq!(parse_page(Some("")).unwrap(), 1);
        assert_eq!(parse_page(Some("3")).unwrap(), 3);
        assert!(parse_page(Some("0")).is_err());
        assert!(parse_page(Some("last")).is_err());
        assert!(parse_page(Some("-1")).is_err());
    }
}
