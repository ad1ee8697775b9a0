use serde::Serialize;

use crate::error::{RecipeError, Result};

/// Parameters of a single catalog query. Names must be non-empty and
/// `items_per_file` at least 1, which [`QueryParameters::new`] enforces.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct QueryParameters {
    short_name: String,
    version: String,
    items_per_file: u32,
    concat_dim: String,
}

impl QueryParameters {
    pub fn new(
        short_name: &str,
        version: &str,
        items_per_file: u32,
        concat_dim: &str,
    ) -> Result<Self> {
        if short_name.trim().is_empty() {
            return Err(RecipeError::InvalidQuery(
                "dataset short name is empty".to_string(),
            ));
        }
        if version.trim().is_empty() {
            return Err(RecipeError::InvalidQuery("version is empty".to_string()));
        }
        if items_per_file == 0 {
            return Err(RecipeError::InvalidQuery(
                "items per file must be at least 1".to_string(),
            ));
        }
        if concat_dim.trim().is_empty() {
            return Err(RecipeError::InvalidQuery(
                "concatenation dimension is empty".to_string(),
            ));
        }

        Ok(Self {
            short_name: short_name.to_string(),
            version: version.to_string(),
            items_per_file,
            concat_dim: concat_dim.to_string(),
        })
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn items_per_file(&self) -> u32 {
        self.items_per_file
    }

    pub fn concat_dim(&self) -> &str {
        &self.concat_dim
    }
}
