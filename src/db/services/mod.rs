//! The `services` module wraps all SQL for the recipe domain. Handlers work with
//! entities and DTOs and never build queries themselves.

pub mod attribute_service;
pub mod filters;
pub mod recipe_service;
pub mod user_service;

pub use attribute_service::*;
pub use recipe_service::*;
pub use user_service::*;
