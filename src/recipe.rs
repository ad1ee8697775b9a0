//! Recipe files: one TOML document per feedstock describing what to query,
//! who to authenticate as, and how the output is stored.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::assemble::{assemble, Mode};
use crate::catalog::cmr::CMR_ENDPOINT;
use crate::catalog::{build_pattern, Catalog, CatalogClient, CatalogKind, DEFAULT_TIMEOUT_SECS};
use crate::credentials::{ClientOptions, CredentialStore, EARTHDATA_LOGIN_HOST};
use crate::error::RecipeError;
use crate::job::JobDescription;
use crate::query::QueryParameters;

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub docs: String,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CatalogConfig {
    #[serde(default)]
    pub kind: CatalogKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            kind: CatalogKind::default(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse(CMR_ENDPOINT).expect("CMR endpoint should always parse")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DatasetConfig {
    pub short_name: String,
    pub version: String,
    #[serde(default = "default_items_per_file")]
    pub items_per_file: u32,
    pub concat_dim: String,
    /// Dimensions that are the same in every file, e.g. lat/lon grids
    #[serde(default)]
    pub identical_dims: Vec<String>,
}

fn default_items_per_file() -> u32 {
    1
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ProviderConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_trust_env")]
    pub trust_env: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            trust_env: default_trust_env(),
        }
    }
}

fn default_host() -> String {
    EARTHDATA_LOGIN_HOST.to_string()
}

fn default_trust_env() -> bool {
    true
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl Recipe {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Error reading recipe: {}", path.display()))?;
        let recipe: Self = toml::from_str(&content)
            .with_context(|| format!("Error parsing recipe: {}", path.display()))?;
        Ok(recipe)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let recipe: Self =
            toml::from_str(&table.to_string()).context("Error deserializing recipe template")?;
        Ok(recipe)
    }

    pub fn query_parameters(self: &Self) -> Result<QueryParameters, RecipeError> {
        QueryParameters::new(
            &self.dataset.short_name,
            &self.dataset.version,
            self.dataset.items_per_file,
            &self.dataset.concat_dim,
        )
    }

    pub fn catalog(self: &Self) -> Result<Catalog, RecipeError> {
        Catalog::new(
            self.catalog.kind,
            self.catalog.endpoint.clone(),
            Duration::from_secs(self.catalog.timeout_secs),
        )
    }

    /// The configured store name, or the mode's default for this dataset.
    pub fn store_name(self: &Self, mode: Mode) -> String {
        match self.output.store_name.as_deref() {
            Some(name) if mode == self.output.mode => name.to_string(),
            _ => mode.default_store_name(&self.dataset.short_name),
        }
    }
}

/// Runs a recipe up to, but not including, execution: credential lookup,
/// catalog query, and stage assembly. `mode` overrides the recipe's own.
pub async fn plan(
    recipe: &Recipe,
    catalog: &impl CatalogClient,
    credentials: &impl CredentialStore,
    mode: Option<Mode>,
) -> Result<JobDescription, RecipeError> {
    let mode = mode.unwrap_or(recipe.output.mode);
    let params = recipe.query_parameters()?;

    // Credentials are local and cheap; check them before touching the network
    let options = ClientOptions::from_store(
        credentials,
        &recipe.provider.host,
        recipe.provider.trust_env,
    )?;
    options.require_auth()?;

    let pattern = build_pattern(catalog, &params, &recipe.dataset.identical_dims).await?;
    let store_name = recipe.store_name(mode);
    let stages = assemble(&pattern, &options, mode, &store_name)?;
    tracing::info!(
        recipe = %recipe.id,
        %mode,
        %store_name,
        stages = stages.len(),
        "Assembled pipeline"
    );

    Ok(JobDescription::new(&recipe.id, mode, &store_name, &pattern, stages))
}

/// GPM IMERG Late Precipitation L3 daily, the reference feedstock.
pub fn gpm_imerg_toml() -> toml::Table {
    toml::toml! {
        id = "gesdisc.gpm_3imergdl"

        name = "GPM IMERG Late Precipitation L3 1 day 0.1 degree x 0.1 degree V06"

        description = "Daily accumulated precipitation from the Integrated Multi-satellitE Retrievals\n\
        for GPM (IMERG) Late run. The Late run is produced about 14 hours after observation\n\
        and combines microwave and infrared satellite estimates on a global 0.1 degree grid."

        docs = "https://disc.gsfc.nasa.gov/datasets/GPM_3IMERGDL_06/summary"

        [catalog]
        kind = "cmr"
        endpoint = "https://cmr.earthdata.nasa.gov"
        timeout_secs = 60

        [dataset]
        short_name = "GPM_3IMERGDL"
        version = "06"
        items_per_file = 1
        concat_dim = "time"
        identical_dims = ["lat", "lon"]

        [provider]
        host = "urs.earthdata.nasa.gov"
        trust_env = true

        [output]
        mode = "materialize"
        store_name = "gpm.zarr"
    }
}
