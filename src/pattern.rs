//! File patterns: the mapping from chunk keys to the remote files holding
//! each chunk, plus the dimension metadata the pipeline stages need.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;

use crate::error::{RecipeError, Result};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Unknown,
    Netcdf3,
    Netcdf4,
    Grib,
    Opendap,
    Zarr,
}

impl FileType {
    pub fn key(&self) -> &str {
        match self {
            Self::Unknown => "unknown",
            Self::Netcdf3 => "netcdf3",
            Self::Netcdf4 => "netcdf4",
            Self::Grib => "grib",
            Self::Opendap => "opendap",
            Self::Zarr => "zarr",
        }
    }

    /// Infers the file type of a single remote file from its url path.
    pub fn from_url(url: &Url) -> Self {
        let path = url.path();
        if path.contains("/opendap/") || path.contains("/dods/") {
            return Self::Opendap;
        }

        let re = Regex::new(r"(?i)\.(?<ext>nc|nc3|nc4|h5|hdf5|he5|grib|grib2|grb|grb2|zarr)/?$")
            .expect("Regex pattern should always compile");
        let Some(captures) = re.captures(path) else {
            return Self::Unknown;
        };

        match captures["ext"].to_lowercase().as_str() {
            "nc3" => Self::Netcdf3,
            "nc" | "nc4" | "h5" | "hdf5" | "he5" => Self::Netcdf4,
            "grib" | "grib2" | "grb" | "grb2" => Self::Grib,
            "zarr" => Self::Zarr,
            _ => Self::Unknown,
        }
    }

    /// The common file type of a sequence of files. Urls without a recognised
    /// extension do not vote; when none is recognised the sequence defaults to
    /// `Netcdf4`. Two or more recognised types make it `Unknown`.
    pub fn from_urls<'a>(urls: impl IntoIterator<Item = &'a Url>) -> Self {
        let types = urls
            .into_iter()
            .map(Self::from_url)
            .filter(|t| *t != Self::Unknown)
            .collect::<BTreeSet<_>>();
        match types.len() {
            0 => Self::Netcdf4,
            1 => types.into_iter().next().unwrap_or(Self::Unknown),
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Position of a chunk in the combined dataset, one index per combine dimension.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ChunkKey(Vec<usize>);

impl ChunkKey {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CombineOp {
    Concat,
    Merge,
}

/// A dimension along which source files are combined.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CombineDim {
    pub name: String,
    pub operation: CombineOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_file: Option<u32>,
}

impl CombineDim {
    pub fn concat(name: &str, items_per_file: u32) -> Self {
        Self {
            name: name.to_string(),
            operation: CombineOp::Concat,
            items_per_file: Some(items_per_file),
        }
    }

    pub fn merge(name: &str) -> Self {
        Self {
            name: name.to_string(),
            operation: CombineOp::Merge,
            items_per_file: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePattern {
    entries: BTreeMap<ChunkKey, Vec<Url>>,
    combine_dims: Vec<CombineDim>,
    identical_dims: Vec<String>,
    file_type: FileType,
}

impl FilePattern {
    pub fn new(
        entries: BTreeMap<ChunkKey, Vec<Url>>,
        combine_dims: Vec<CombineDim>,
        identical_dims: Vec<String>,
        file_type: FileType,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(RecipeError::InvalidPattern("pattern has no chunks".to_string()));
        }
        if combine_dims.is_empty() {
            return Err(RecipeError::InvalidPattern(
                "pattern has no combine dimensions".to_string(),
            ));
        }

        let mut names = BTreeSet::new();
        for dim in combine_dims.iter() {
            if !names.insert(dim.name.as_str()) {
                return Err(RecipeError::InvalidPattern(format!(
                    "combine dimension '{}' is declared twice",
                    dim.name
                )));
            }
            if dim.items_per_file == Some(0) {
                return Err(RecipeError::InvalidPattern(format!(
                    "combine dimension '{}' has zero items per file",
                    dim.name
                )));
            }
        }
        if let Some(dim) = identical_dims.iter().find(|d| names.contains(d.as_str())) {
            return Err(RecipeError::InvalidPattern(format!(
                "dimension '{dim}' cannot be both combined and identical"
            )));
        }

        for (key, urls) in entries.iter() {
            if urls.is_empty() {
                return Err(RecipeError::InvalidPattern(format!(
                    "chunk {:?} has no source files",
                    key.indices()
                )));
            }
            if key.indices().len() != combine_dims.len() {
                return Err(RecipeError::InvalidPattern(format!(
                    "chunk {:?} does not have one index per combine dimension",
                    key.indices()
                )));
            }
        }

        Ok(Self {
            entries,
            combine_dims,
            identical_dims,
            file_type,
        })
    }

    /// One chunk per file, concatenated along `concat_dim` in the order given.
    /// The file type is inferred from the urls.
    pub fn from_file_sequence(
        urls: Vec<Url>,
        concat_dim: &str,
        items_per_file: u32,
        identical_dims: &[String],
    ) -> Result<Self> {
        let file_type = FileType::from_urls(&urls);
        let entries = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| (ChunkKey::new(vec![index]), vec![url]))
            .collect::<BTreeMap<_, _>>();

        Self::new(
            entries,
            vec![CombineDim::concat(concat_dim, items_per_file)],
            identical_dims.to_vec(),
            file_type,
        )
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn items(&self) -> impl Iterator<Item = (&ChunkKey, &[Url])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn combine_dim_keys(&self) -> &[CombineDim] {
        &self.combine_dims
    }

    pub fn concat_dims(&self) -> Vec<String> {
        self.combine_dims
            .iter()
            .filter(|d| d.operation == CombineOp::Concat)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn identical_dims(&self) -> &[String] {
        &self.identical_dims
    }
}
