//! Unified error type for llmscan.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("syntax parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
