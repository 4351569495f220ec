use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, JoinType},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
    TransactionTrait,
};
use serde::Serialize;

use crate::db::entities::{ingredient, recipe, recipe_ingredient, tag};
use crate::db::services::attribute_service::{self, Attribute, RecipeAttribute};
use crate::db::services::filters::{fold_case, folded_contains, search_keywords};

/// Page size of the recipe list and search pages.
pub const RECIPES_PER_PAGE: u64 = 2;

/// Restricts a user's recipe list. Within one list the ids are OR-ed; the two lists are AND-ed.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

/// Scalar fields of a recipe. `None` leaves the stored value untouched on update.
#[derive(Debug, Default, Clone)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// New links of one attribute kind, replacing the current ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSet {
    /// Ids of attributes the owner already has.
    Ids(Vec<i32>),
    /// Names looked up among the owner's attributes, created when missing.
    Names(Vec<String>),
}

/// Replacement link sets. `None` keeps the current links.
#[derive(Debug, Default, Clone)]
pub struct RecipeLinks {
    pub tags: Option<LinkSet>,
    pub ingredients: Option<LinkSet>,
}

#[derive(Debug, Clone)]
pub struct RecipeWithAttributes {
    pub recipe: recipe::Model,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct IngredientUsage {
    pub id: i32,
    pub name: String,
    pub recipe_count: i64,
}

#[derive(Debug)]
pub struct RecipePage {
    pub recipes: Vec<recipe::Model>,
    /// 1-based.
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl RecipePage {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }
}

// --- Owner-scoped queries (API) ---

pub async fn list_recipes_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    filter: &RecipeFilter,
) -> Result<Vec<recipe::Model>, DbErr> {
    let mut query = recipe::Entity::find().filter(recipe::Column::UserId.eq(user_id));
    if !filter.tag_ids.is_empty() {
        query = query.filter(
            recipe::Column::Id.in_subquery(attribute_service::recipes_linked_to_any::<tag::Entity>(&filter.tag_ids)),
        );
    }
    if !filter.ingredient_ids.is_empty() {
        query = query.filter(recipe::Column::Id.in_subquery(
            attribute_service::recipes_linked_to_any::<ingredient::Entity>(&filter.ingredient_ids),
        ));
    }
    query.order_by_desc(recipe::Column::Id).all(db).await
}

pub async fn get_recipe_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
) -> Result<Option<recipe::Model>, DbErr> {
    recipe::Entity::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(db)
        .await
}

pub async fn get_recipe<C: ConnectionTrait>(db: &C, recipe_id: i32) -> Result<Option<recipe::Model>, DbErr> {
    recipe::Entity::find_by_id(recipe_id).one(db).await
}

// --- Writes ---

/// Inserts a recipe and its links in one transaction. Attributes named in `links`
/// are created inside the same transaction.
pub async fn create_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    title: &str,
    description: &str,
    links: &RecipeLinks,
) -> Result<recipe::Model, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now();
    let created = recipe::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.to_string()),
        title_search: Set(fold_case(title)),
        description: Set(description.to_string()),
        image: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    apply_links(&txn, user_id, created.id, links).await?;
    txn.commit().await?;
    Ok(created)
}

/// Updates scalar fields, then the links, as a single transaction.
pub async fn update_recipe(
    db: &DatabaseConnection,
    existing: recipe::Model,
    changes: RecipeChanges,
    links: &RecipeLinks,
) -> Result<recipe::Model, DbErr> {
    let txn = db.begin().await?;
    let user_id = existing.user_id;
    let mut active: recipe::ActiveModel = existing.into();
    if let Some(title) = changes.title {
        active.title_search = Set(fold_case(&title));
        active.title = Set(title);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    apply_links(&txn, user_id, updated.id, links).await?;
    txn.commit().await?;
    Ok(updated)
}

async fn apply_links<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
    links: &RecipeLinks,
) -> Result<(), DbErr> {
    if let Some(tags) = &links.tags {
        let tag_ids = resolve_link_set::<tag::Entity, C>(db, user_id, tags).await?;
        attribute_service::replace_links::<tag::Entity, C>(db, recipe_id, &tag_ids).await?;
    }
    if let Some(ingredients) = &links.ingredients {
        let ingredient_ids = resolve_link_set::<ingredient::Entity, C>(db, user_id, ingredients).await?;
        attribute_service::replace_links::<ingredient::Entity, C>(db, recipe_id, &ingredient_ids).await?;
    }
    Ok(())
}

async fn resolve_link_set<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    links: &LinkSet,
) -> Result<Vec<i32>, DbErr> {
    match links {
        LinkSet::Ids(ids) => Ok(ids.clone()),
        LinkSet::Names(names) => {
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                ids.push(attribute_service::get_or_create_attribute::<E, C>(db, user_id, name).await?.id);
            }
            Ok(ids)
        }
    }
}

pub async fn set_recipe_image<C: ConnectionTrait>(
    db: &C,
    existing: recipe::Model,
    image: Option<String>,
) -> Result<recipe::Model, DbErr> {
    let mut active: recipe::ActiveModel = existing.into();
    active.image = Set(image);
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

/// Deletes a recipe owned by `user_id`, returning the removed row.
pub async fn delete_recipe_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
) -> Result<Option<recipe::Model>, DbErr> {
    let Some(existing) = get_recipe_for_user(db, user_id, recipe_id).await? else {
        return Ok(None);
    };
    recipe::Entity::delete_by_id(existing.id).exec(db).await?;
    Ok(Some(existing))
}

// --- Attributes ---

pub async fn with_attributes<C: ConnectionTrait>(
    db: &C,
    recipes: Vec<recipe::Model>,
) -> Result<Vec<RecipeWithAttributes>, DbErr> {
    let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let mut tags = attribute_service::attributes_for_recipes::<tag::Entity, C>(db, &ids).await?;
    let mut ingredients = attribute_service::attributes_for_recipes::<ingredient::Entity, C>(db, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeWithAttributes {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

pub async fn load_attributes<C: ConnectionTrait>(db: &C, recipe: recipe::Model) -> Result<RecipeWithAttributes, DbErr> {
    let mut loaded = with_attributes(db, vec![recipe]).await?;
    loaded
        .pop()
        .ok_or_else(|| DbErr::Custom("recipe vanished while loading attributes".to_string()))
}

// --- Public listing (pages) ---

/// All recipes, reverse title order.
pub fn all_recipes() -> Select<recipe::Entity> {
    recipe::Entity::find()
        .order_by_desc(recipe::Column::Title)
        .order_by_desc(recipe::Column::Id)
}

/// Recipes where any keyword is a case-insensitive substring of the title, a tag name
/// or an ingredient name. A query without keywords matches every recipe.
/// Matching runs on the case-folded search columns.
pub fn search_recipes(query: &str) -> Select<recipe::Entity> {
    let keywords = search_keywords(query);
    if keywords.is_empty() {
        return all_recipes();
    }

    let mut any_keyword = Condition::any();
    for keyword in &keywords {
        any_keyword = any_keyword
            .add(folded_contains(
                Expr::col((recipe::Entity, recipe::Column::TitleSearch)),
                keyword,
            ))
            .add(recipe::Column::Id.in_subquery(
                attribute_service::recipes_with_name_containing::<tag::Entity>(keyword),
            ))
            .add(recipe::Column::Id.in_subquery(
                attribute_service::recipes_with_name_containing::<ingredient::Entity>(keyword),
            ));
    }
    all_recipes().filter(any_keyword)
}

/// Fetches one 1-based page. `Ok(None)` means the page is out of range; page 1 always exists.
pub async fn paginate_recipes<C: ConnectionTrait>(
    db: &C,
    query: Select<recipe::Entity>,
    page: u64,
) -> Result<Option<RecipePage>, DbErr> {
    let paginator = query.paginate(db, RECIPES_PER_PAGE);
    let counts = paginator.num_items_and_pages().await?;
    let num_pages = counts.number_of_pages.max(1);
    if page == 0 || page > num_pages {
        return Ok(None);
    }
    let recipes = paginator.fetch_page(page - 1).await?;
    Ok(Some(RecipePage {
        recipes,
        number: page,
        num_pages,
        total: counts.number_of_items,
    }))
}

/// Ingredients ranked by how many recipes use them.
pub async fn top_ingredients<C: ConnectionTrait>(db: &C, limit: u64) -> Result<Vec<IngredientUsage>, DbErr> {
    ingredient::Entity::find()
        .select_only()
        .column(ingredient::Column::Id)
        .column(ingredient::Column::Name)
        .column_as(
            Expr::col((recipe_ingredient::Entity, recipe_ingredient::Column::RecipeId)).count(),
            "recipe_count",
        )
        .join(JoinType::LeftJoin, ingredient::Relation::RecipeIngredients.def())
        .group_by(ingredient::Column::Id)
        .group_by(ingredient::Column::Name)
        .order_by_desc(Expr::cust("recipe_count"))
        .order_by_asc(ingredient::Column::Id)
        .limit(limit)
        .into_model::<IngredientUsage>()
        .all(db)
        .await
}
