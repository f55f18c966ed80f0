//! Cartograph Core: manifest data model, merge engine, coverage and storage

pub mod config;
pub mod content;
pub mod coverage;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod model;
pub mod render;
pub mod store;

#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, ParseMode, ParseOptions, ProjectContext, ScanContext};
pub use content::{
    ExportEntry, ExportRegistry, ImportGraph, KeyIndex, ManifestContent, PatternReport,
    SymbolRegistry, documented_index, key_count,
};
pub use coverage::Coverage;
pub use error::{ConfigError, ManifestError};
pub use manifest::{
    AutoRegion, ManifestDocument, ManifestKind, ManifestMetadata, ManualRegion, PriorManifest,
    is_manual_key,
};
pub use merge::{MergeOutcome, key_delta, merge};
pub use model::{
    ApiExport, ApiSurface, DependencyRef, ExportEdge, ExportKind, ImportEdge, Parameter,
    PatternCategory, PatternFinding, SymbolKey, SymbolKind, SymbolRecord, TechStack,
    relative_path,
};
pub use render::render_markdown;
pub use store::{ManifestStore, StagedManifest};
