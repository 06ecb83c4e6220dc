use std::env;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Undefined id")]
    UndefinedId,
    #[error("id must be a string, got {0}")]
    InvalidIdType(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Data has not been saved")]
    NotSaved,
    #[error("Document {id} no longer exists in collection {collection}")]
    DocumentMissing { collection: String, id: String },
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
