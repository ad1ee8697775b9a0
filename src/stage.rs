use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::credentials::ClientOptions;
use crate::pattern::{CombineDim, FileType};

/// Input name of the first stage: the (chunk key, urls) items of the pattern.
pub const PATTERN_SOURCE: &str = "pattern-items";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    OpenWithKerchunk,
    CombineReferences,
    WriteCombinedReference,
    OpenUrlWithFsspec,
    OpenWithXarray,
    StoreToZarr,
}

impl StageKind {
    pub fn name(&self) -> &str {
        match self {
            Self::OpenWithKerchunk => "open-with-kerchunk",
            Self::CombineReferences => "combine-references",
            Self::WriteCombinedReference => "write-combined-reference",
            Self::OpenUrlWithFsspec => "open-url-with-fsspec",
            Self::OpenWithXarray => "open-with-xarray",
            Self::StoreToZarr => "store-to-zarr",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    List(Vec<String>),
    FileType(FileType),
    Client(ClientOptions),
    CombineDims(Vec<CombineDim>),
}

/// One transform of the pipeline with its bound parameters.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub input: String,
    pub params: BTreeMap<String, ParamValue>,
}

impl StageDescriptor {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            input: PATTERN_SOURCE.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: ParamValue) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

/// Links each stage to the output of the stage before it.
pub fn chain(stages: Vec<StageDescriptor>) -> Vec<StageDescriptor> {
    let mut input = PATTERN_SOURCE.to_string();
    stages
        .into_iter()
        .map(|mut stage| {
            stage.input = std::mem::replace(&mut input, stage.kind.name().to_string());
            stage
        })
        .collect()
}
