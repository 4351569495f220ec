//! Tags and ingredients share one shape: a user-owned name linked to recipes
//! through a join table. `RecipeAttribute` captures that shape so the queries
//! below are written once for both.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Order, Query, SelectStatement},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

use crate::db::entities::{ingredient, recipe_ingredient, recipe_tag, tag};
use crate::db::services::filters::{fold_case, folded_contains};

/// A tag or ingredient as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct Attribute {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, FromQueryResult)]
struct LinkedAttribute {
    recipe_id: i32,
    id: i32,
    name: String,
}

pub trait RecipeAttribute: EntityTrait {
    /// Join table between `recipes` and this attribute.
    type Link: EntityTrait;

    /// Lowercase singular name, used in logs and error messages.
    const KIND: &'static str;

    fn id_column() -> Self::Column;
    fn user_column() -> Self::Column;
    fn name_column() -> Self::Column;
    /// Case-folded copy of the name, kept in step with `name_column`.
    fn search_column() -> Self::Column;
    fn link_recipe_column() -> <Self::Link as EntityTrait>::Column;
    fn link_attribute_column() -> <Self::Link as EntityTrait>::Column;

    fn insert_named<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
        name: &str,
    ) -> impl Future<Output = Result<Attribute, DbErr>> + Send;

    /// Inserts join rows; `attribute_ids` must be free of duplicates.
    fn insert_links<C: ConnectionTrait>(
        db: &C,
        recipe_id: i32,
        attribute_ids: &[i32],
    ) -> impl Future<Output = Result<(), DbErr>> + Send;
}

impl RecipeAttribute for tag::Entity {
    type Link = recipe_tag::Entity;
    const KIND: &'static str = "tag";

    fn id_column() -> tag::Column {
        tag::Column::Id
    }
    fn user_column() -> tag::Column {
        tag::Column::UserId
    }
    fn name_column() -> tag::Column {
        tag::Column::Name
    }
    fn search_column() -> tag::Column {
        tag::Column::NameSearch
    }
    fn link_recipe_column() -> recipe_tag::Column {
        recipe_tag::Column::RecipeId
    }
    fn link_attribute_column() -> recipe_tag::Column {
        recipe_tag::Column::TagId
    }

    async fn insert_named<C: ConnectionTrait>(db: &C, user_id: i32, name: &str) -> Result<Attribute, DbErr> {
        let model = tag::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_string()),
            name_search: Set(fold_case(name)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(Attribute { id: model.id, name: model.name })
    }

    async fn insert_links<C: ConnectionTrait>(db: &C, recipe_id: i32, attribute_ids: &[i32]) -> Result<(), DbErr> {
        if attribute_ids.is_empty() {
            return Ok(());
        }
        let links = attribute_ids.iter().map(|&tag_id| recipe_tag::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag_id),
        });
        recipe_tag::Entity::insert_many(links).exec_without_returning(db).await?;
        Ok(())
    }
}

impl RecipeAttribute for ingredient::Entity {
    type Link = recipe_ingredient::Entity;
    const KIND: &'static str = "ingredient";

    fn id_column() -> ingredient::Column {
        ingredient::Column::Id
    }
    fn user_column() -> ingredient::Column {
        ingredient::Column::UserId
    }
    fn name_column() -> ingredient::Column {
        ingredient::Column::Name
    }
    fn search_column() -> ingredient::Column {
        ingredient::Column::NameSearch
    }
    fn link_recipe_column() -> recipe_ingredient::Column {
        recipe_ingredient::Column::RecipeId
    }
    fn link_attribute_column() -> recipe_ingredient::Column {
        recipe_ingredient::Column::IngredientId
    }

    async fn insert_named<C: ConnectionTrait>(db: &C, user_id: i32, name: &str) -> Result<Attribute, DbErr> {
        let model = ingredient::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_string()),
            name_search: Set(fold_case(name)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(Attribute { id: model.id, name: model.name })
    }

    async fn insert_links<C: ConnectionTrait>(db: &C, recipe_id: i32, attribute_ids: &[i32]) -> Result<(), DbErr> {
        if attribute_ids.is_empty() {
            return Ok(());
        }
        let links = attribute_ids.iter().map(|&ingredient_id| recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(ingredient_id),
        });
        recipe_ingredient::Entity::insert_many(links).exec_without_returning(db).await?;
        Ok(())
    }
}

// --- Queries ---

/// Lists a user's attributes by descending name, optionally only those linked to a recipe.
pub async fn list_attributes<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    assigned_only: bool,
) -> Result<Vec<Attribute>, DbErr> {
    let mut query = E::find().filter(E::user_column().eq(user_id));
    if assigned_only {
        let linked = Query::select()
            .column(E::link_attribute_column())
            .from(E::Link::default())
            .to_owned();
        query = query.filter(E::id_column().in_subquery(linked));
    }
    query
        .order_by_desc(E::name_column())
        .order_by_desc(E::id_column())
        .into_model::<Attribute>()
        .all(db)
        .await
}

pub async fn get_attribute<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    attribute_id: i32,
) -> Result<Option<Attribute>, DbErr> {
    E::find()
        .filter(E::id_column().eq(attribute_id))
        .filter(E::user_column().eq(user_id))
        .into_model::<Attribute>()
        .one(db)
        .await
}

pub async fn create_attribute<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: &str,
) -> Result<Attribute, DbErr> {
    E::insert_named(db, user_id, name).await
}

/// Renames an attribute owned by `user_id`. Returns `None` when no such attribute exists.
pub async fn rename_attribute<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    attribute_id: i32,
    name: &str,
) -> Result<Option<Attribute>, DbErr> {
    let result = E::update_many()
        .col_expr(E::name_column(), Expr::value(name.to_string()))
        .col_expr(E::search_column(), Expr::value(fold_case(name)))
        .filter(E::id_column().eq(attribute_id))
        .filter(E::user_column().eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    get_attribute::<E, C>(db, user_id, attribute_id).await
}

/// Deletes an attribute; join rows go with it through the cascade.
pub async fn delete_attribute<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    attribute_id: i32,
) -> Result<bool, DbErr> {
    let result = E::delete_many()
        .filter(E::id_column().eq(attribute_id))
        .filter(E::user_column().eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Finds the user's attribute with exactly this name, creating it if missing.
pub async fn get_or_create_attribute<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: &str,
) -> Result<Attribute, DbErr> {
    let existing = E::find()
        .filter(E::user_column().eq(user_id))
        .filter(E::name_column().eq(name))
        .order_by_asc(E::id_column())
        .into_model::<Attribute>()
        .one(db)
        .await?;
    match existing {
        Some(attribute) => Ok(attribute),
        None => E::insert_named(db, user_id, name).await,
    }
}

/// Returns which of `attribute_ids` belong to `user_id`.
pub async fn owned_attribute_ids<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    attribute_ids: &[i32],
) -> Result<Vec<i32>, DbErr> {
    if attribute_ids.is_empty() {
        return Ok(Vec::new());
    }
    let owned = E::find()
        .filter(E::user_column().eq(user_id))
        .filter(E::id_column().is_in(attribute_ids.iter().copied()))
        .into_model::<Attribute>()
        .all(db)
        .await?;
    Ok(owned.into_iter().map(|attribute| attribute.id).collect())
}

/// Makes `attribute_ids` the complete set of links between the recipe and `E`.
pub async fn replace_links<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    attribute_ids: &[i32],
) -> Result<(), DbErr> {
    E::Link::delete_many()
        .filter(E::link_recipe_column().eq(recipe_id))
        .exec(db)
        .await?;

    let mut unique_ids = attribute_ids.to_vec();
    unique_ids.sort_unstable();
    unique_ids.dedup();
    E::insert_links(db, recipe_id, &unique_ids).await
}

/// Attributes linked to each of `recipe_ids`, keyed by recipe and ordered by name.
pub async fn attributes_for_recipes<E: RecipeAttribute, C: ConnectionTrait>(
    db: &C,
    recipe_ids: &[i32],
) -> Result<HashMap<i32, Vec<Attribute>>, DbErr> {
    let mut grouped: HashMap<i32, Vec<Attribute>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(grouped);
    }

    let stmt = Query::select()
        .column((E::Link::default(), E::link_recipe_column()))
        .column((E::default(), E::id_column()))
        .column((E::default(), E::name_column()))
        .from(E::Link::default())
        .inner_join(
            E::default(),
            Expr::col((E::default(), E::id_column())).equals((E::Link::default(), E::link_attribute_column())),
        )
        .and_where(Expr::col((E::Link::default(), E::link_recipe_column())).is_in(recipe_ids.iter().copied()))
        .order_by((E::default(), E::name_column()), Order::Asc)
        .order_by((E::default(), E::id_column()), Order::Asc)
        .to_owned();

    let rows = LinkedAttribute::find_by_statement(db.get_database_backend().build(&stmt))
        .all(db)
        .await?;
    for row in rows {
        grouped
            .entry(row.recipe_id)
            .or_default()
            .push(Attribute { id: row.id, name: row.name });
    }
    Ok(grouped)
}

/// `SELECT recipe_id` of recipes linked to any of `attribute_ids`.
pub fn recipes_linked_to_any<E: RecipeAttribute>(attribute_ids: &[i32]) -> SelectStatement {
    Query::select()
        .column(E::link_recipe_column())
        .from(E::Link::default())
        .and_where(Expr::col(E::link_attribute_column()).is_in(attribute_ids.iter().copied()))
        .to_owned()
}

/// `SELECT recipe_id` of recipes linked to an attribute whose name contains `keyword`.
pub fn recipes_with_name_containing<E: RecipeAttribute>(keyword: &str) -> SelectStatement {
    Query::select()
        .column((E::Link::default(), E::link_recipe_column()))
        .from(E::Link::default())
        .inner_join(
            E::default(),
            Expr::col((E::default(), E::id_column())).equals((E::Link::default(), E::link_attribute_column())),
        )
        .and_where(folded_contains(Expr::col((E::default(), E::search_column())), keyword))
        .to_owned()
}
