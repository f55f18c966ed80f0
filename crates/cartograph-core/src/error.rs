//! Error types for manifest handling and configuration

use std::path::PathBuf;

/// Errors raised while building, reading or writing manifest documents.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reserved key in auto-generated region: {0}")]
    ReservedKey(String),

    #[error("Invalid manifest structure: {0}")]
    Structure(String),
}

/// Errors raised while loading configuration or building a scan context.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid exclusion glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("Root path does not exist or is not a directory: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
