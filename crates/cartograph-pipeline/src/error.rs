//! Error types for the refresh pipeline

use std::path::PathBuf;

use cartograph_core::{ConfigError, ManifestError};

/// Failures that stop a run. Everything else is reported as an issue.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot create manifest directory {}: {source}", path.display())]
    ManifestDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write manifests: {0}")]
    Persist(#[from] ManifestError),
}

/// Version-control history could not be read. Always absorbed into degraded mode.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git log failed: {0}")]
    Failed(String),

    #[error("unexpected git log output: {0}")]
    Parse(String),
}
