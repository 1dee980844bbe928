#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid storage key '{key}': {msg}")]
    InvalidStorageKey { key: String, msg: String },

    #[error("failed to encode task list: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("io error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
