//! Catalog clients and the pattern builder that turns their results into a
//! [`FilePattern`].
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{RecipeError, Result};
use crate::pattern::FilePattern;
use crate::query::QueryParameters;

pub mod cmr;
pub mod stac_api;

pub use cmr::CmrCatalog;
pub use stac_api::StacCatalog;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub trait CatalogClient {
    /// Urls of every granule file of the queried dataset, in catalog order.
    /// Fails with `CatalogLookup` when the dataset itself is unknown.
    async fn search(self: &Self, params: &QueryParameters) -> Result<Vec<Url>>;
}

/// Which catalog flavour a recipe queries.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    #[default]
    Cmr,
    Stac,
}

/// A catalog client picked at runtime from recipe configuration.
pub enum Catalog {
    Cmr(CmrCatalog),
    Stac(StacCatalog),
}

impl Catalog {
    pub fn new(kind: CatalogKind, endpoint: Url, timeout: Duration) -> Result<Self> {
        let catalog = match kind {
            CatalogKind::Cmr => Self::Cmr(CmrCatalog::new(endpoint, timeout)?),
            CatalogKind::Stac => Self::Stac(StacCatalog::new(endpoint, timeout)?),
        };
        Ok(catalog)
    }
}

impl CatalogClient for Catalog {
    async fn search(self: &Self, params: &QueryParameters) -> Result<Vec<Url>> {
        match self {
            Self::Cmr(c) => c.search(params).await,
            Self::Stac(c) => c.search(params).await,
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("granule-recipe/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Relative joins only append to a base whose path ends in '/'.
pub(crate) fn as_base(mut endpoint: Url) -> Url {
    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }
    endpoint
}

/// Queries the catalog and lays the granule files out as a file pattern with
/// one chunk per file along the query's concatenation dimension.
pub async fn build_pattern(
    catalog: &impl CatalogClient,
    params: &QueryParameters,
    identical_dims: &[String],
) -> Result<FilePattern> {
    tracing::info!(
        short_name = params.short_name(),
        version = params.version(),
        "Querying catalog"
    );
    let urls = catalog.search(params).await?;
    if urls.is_empty() {
        return Err(RecipeError::EmptyResult {
            short_name: params.short_name().to_string(),
            version: params.version().to_string(),
        });
    }

    let pattern = FilePattern::from_file_sequence(
        urls,
        params.concat_dim(),
        params.items_per_file(),
        identical_dims,
    )?;
    tracing::info!(
        files = pattern.len(),
        file_type = %pattern.file_type(),
        "Built file pattern"
    );
    Ok(pattern)
}
