#![allow(async_fn_in_trait)]
pub mod assemble;
pub mod catalog;
pub mod credentials;
pub mod error;
pub mod job;
pub mod pattern;
pub mod query;
pub mod recipe;
pub mod stage;

pub use assemble::{assemble, Mode};
pub use catalog::{build_pattern, CatalogClient};
pub use error::RecipeError;
pub use job::JobDescription;
pub use pattern::FilePattern;
pub use recipe::{plan, Recipe};
