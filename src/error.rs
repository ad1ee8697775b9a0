use thiserror::Error;

use crate::pattern::FileType;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Dataset {short_name} version {version} is not known to the catalog")]
    CatalogLookup { short_name: String, version: String },

    #[error("Catalog returned no files for dataset {short_name} version {version}")]
    EmptyResult { short_name: String, version: String },

    #[error("No credentials found for host: {0}")]
    CredentialNotFound(String),

    #[error("File type '{file_type}' cannot be opened by the {stage} stage")]
    UnsupportedFileType { file_type: FileType, stage: String },

    #[error("Client options are missing the {0} required to open remote files")]
    MissingCredentials(&'static str),

    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    #[error("Store name must not be empty")]
    InvalidStoreName,

    #[error("Invalid catalog url: {0}")]
    CatalogUrl(#[from] url::ParseError),

    #[error("Catalog request failed: {0}")]
    Catalog(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RecipeError>;
