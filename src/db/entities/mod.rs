//! SeaORM entities mapping the recipe tables.

pub mod user;
pub mod recipe;
pub mod tag;
pub mod ingredient;
pub mod recipe_tag;
pub mod recipe_ingredient;
