//! Turns a file pattern into the ordered stage descriptors of a pipeline.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credentials::ClientOptions;
use crate::error::{RecipeError, Result};
use crate::pattern::{FilePattern, FileType};
use crate::stage::{chain, ParamValue, StageDescriptor, StageKind};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Write a reference index pointing at byte ranges of the source files
    Reference,
    /// Rewrite the data into a zarr store
    #[default]
    Materialize,
}

impl Mode {
    /// The stage that has to understand the source file format.
    pub fn conversion_stage(&self) -> StageKind {
        match self {
            Self::Reference => StageKind::OpenWithKerchunk,
            Self::Materialize => StageKind::OpenWithXarray,
        }
    }

    pub fn supports(&self, file_type: FileType) -> bool {
        match self {
            Self::Reference => matches!(
                file_type,
                FileType::Netcdf3 | FileType::Netcdf4 | FileType::Grib
            ),
            // xarray picks an engine itself when the type is unknown
            Self::Materialize => true,
        }
    }

    /// Store name used when a recipe does not set one, e.g. `gpm.zarr` or
    /// `gpm-kerchunk` for `GPM_3IMERGDL`.
    pub fn default_store_name(&self, short_name: &str) -> String {
        let prefix = short_name
            .split(['_', '.', '-'])
            .find(|s| !s.is_empty())
            .unwrap_or(short_name)
            .to_lowercase();
        match self {
            Self::Reference => format!("{prefix}-kerchunk"),
            Self::Materialize => format!("{prefix}.zarr"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Materialize => f.write_str("materialize"),
        }
    }
}

/// Builds the three stages of `mode`. Every check runs before the first
/// descriptor is built, so an error never leaves a partial pipeline behind.
pub fn assemble(
    pattern: &FilePattern,
    options: &ClientOptions,
    mode: Mode,
    store_name: &str,
) -> Result<Vec<StageDescriptor>> {
    if store_name.trim().is_empty() {
        return Err(RecipeError::InvalidStoreName);
    }
    options.require_auth()?;

    let file_type = pattern.file_type();
    if !mode.supports(file_type) {
        return Err(RecipeError::UnsupportedFileType {
            file_type,
            stage: mode.conversion_stage().to_string(),
        });
    }

    let client = ParamValue::Client(options.clone());
    let store_name = ParamValue::Str(store_name.to_string());

    let stages = match mode {
        Mode::Reference => vec![
            StageDescriptor::new(StageKind::OpenWithKerchunk)
                .param("storage_options", client)
                .param("file_type", ParamValue::FileType(file_type)),
            StageDescriptor::new(StageKind::CombineReferences)
                .param("concat_dims", ParamValue::List(pattern.concat_dims()))
                .param(
                    "identical_dims",
                    ParamValue::List(pattern.identical_dims().to_vec()),
                ),
            StageDescriptor::new(StageKind::WriteCombinedReference)
                .param("store_name", store_name),
        ],
        Mode::Materialize => vec![
            StageDescriptor::new(StageKind::OpenUrlWithFsspec).param("open_kwargs", client),
            StageDescriptor::new(StageKind::OpenWithXarray)
                .param("file_type", ParamValue::FileType(file_type)),
            StageDescriptor::new(StageKind::StoreToZarr)
                .param("store_name", store_name)
                .param(
                    "combine_dims",
                    ParamValue::CombineDims(pattern.combine_dim_keys().to_vec()),
                ),
        ],
    };

    Ok(chain(stages))
}
