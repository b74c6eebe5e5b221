use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetFetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid asset manifest: {details}")]
    InvalidManifest { details: String },

    #[error("Download directory creation failed at {path}: {reason}")]
    DownloadDirectoryCreation { path: PathBuf, reason: String },

    #[error("Invalid command-line arguments: {details}")]
    CliArgumentValidation { details: String },

    #[error("{failed} of {total} downloads failed")]
    IncompleteRun { failed: usize, total: usize },

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] eyre::Report),
}
