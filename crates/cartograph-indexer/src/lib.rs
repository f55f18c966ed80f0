//! Source scanning, syntax extraction and convention detection

pub mod api;
pub mod coordinator;
pub mod deps;
pub mod extractor;
pub mod heuristics;
pub mod languages;
pub mod parser_pool;
pub mod scanner;

#[cfg(test)]
mod tests;

pub use coordinator::{Coordinator, ExtractionBatch, ExtractionIssue, RepositoryIndex};
pub use deps::{ManifestReadIssue, PackageJson, ProjectManifests};
pub use extractor::{ExtractError, FileExtraction, LanguageExtractor};
pub use heuristics::{RULESET_VERSION, SourceSignals};
pub use parser_pool::FileType;
pub use scanner::{ScanIssue, ScanOutcome, SourceFile, scan};
