use serde::{Deserialize, Serialize};

use crate::db::services::{Attribute, RecipeWithAttributes};
use crate::services::image_storage;

/// Nested tag/ingredient reference in recipe payloads, resolved by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamePayload {
    pub name: String,
}

/// Body of recipe create/update. On `PATCH` every field is optional; on `POST`
/// and `PUT` the title is required.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<NamePayload>>,
    pub ingredients: Option<Vec<NamePayload>>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: i32,
    pub title: String,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeImageResponse {
    pub id: i32,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeListQuery {
    pub assigned_only: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttributePayload {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuickAddRequest {
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl From<RecipeWithAttributes> for RecipeSummary {
    fn from(loaded: RecipeWithAttributes) -> Self {
        RecipeSummary {
            id: loaded.recipe.id,
            title: loaded.recipe.title,
            tags: loaded.tags,
            ingredients: loaded.ingredients,
        }
    }
}

impl From<RecipeWithAttributes> for RecipeDetail {
    fn from(loaded: RecipeWithAttributes) -> Self {
        RecipeDetail {
            id: loaded.recipe.id,
            title: loaded.recipe.title,
            description: loaded.recipe.description,
            image: loaded.recipe.image.as_deref().map(image_storage::public_url),
            tags: loaded.tags,
            ingredients: loaded.ingredients,
        }
    }
}
