//! Orchestrates parallel extraction and assembles the repository index

use std::path::Path;

use cartograph_core::{
    ApiSurface, AutoRegion, ExportRegistry, ImportGraph, KeyIndex, ManifestContent,
    ManifestError, ManifestKind, PatternReport, ScanContext, SymbolRegistry, TechStack,
};
use rayon::prelude::*;

use crate::api::build_api_surface;
use crate::deps::{ManifestReadIssue, build_tech_stack, read_manifests};
use crate::extractor::{ExtractError, FileExtraction};
use crate::heuristics::{RULESET_VERSION, SourceSignals, detect_patterns};
use crate::languages::get_extractor;
use crate::scanner::{ScanIssue, SourceFile};

/// A file skipped during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionIssue {
    pub path: String,
    pub reason: String,
}

/// Results of one extraction pass, ordered by file path.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub files: Vec<FileExtraction>,
    pub errors: Vec<ExtractionIssue>,
    pub signals: SourceSignals,
}

pub struct Coordinator<'a> {
    ctx: &'a ScanContext,
}

impl<'a> Coordinator<'a> {
    pub fn new(ctx: &'a ScanContext) -> Self {
        Coordinator { ctx }
    }

    /// Extract every file on the rayon pool.
    ///
    /// Workers share nothing but the context; results are sorted by path after
    /// collection so completion order never leaks into the output.
    pub fn extract_all(&self, files: &[SourceFile]) -> ExtractionBatch {
        let mut results: Vec<(String, Result<FileExtraction, ExtractError>)> = files
            .par_iter()
            .map(|file| (file.relative.clone(), self.extract_one(file)))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut batch = ExtractionBatch::default();
        for (path, result) in results {
            match result {
                Ok(extraction) => {
                    batch.signals.merge(&extraction.signals);
                    batch.files.push(extraction);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path, e);
                    batch.errors.push(ExtractionIssue {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        tracing::debug!(
            "Extracted {} files ({} skipped)",
            batch.files.len(),
            batch.errors.len()
        );
        batch
    }

    pub fn extract_one(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let extractor = get_extractor(Path::new(&file.relative)).ok_or(ExtractError::Unsupported)?;
        let bytes = std::fs::read(&file.absolute)?;
        let source = String::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)?;
        extractor.extract(&file.relative, &source, self.ctx.parse_options())
    }
}

/// Everything one run knows about the scanned repository, ready to be merged
/// into manifests.
#[derive(Debug, Clone, Default)]
pub struct RepositoryIndex {
    pub files: Vec<String>,
    pub symbols: SymbolRegistry,
    pub exports: ExportRegistry,
    pub imports: ImportGraph,
    pub tech_stack: TechStack,
    pub patterns: PatternReport,
    pub api_surface: ApiSurface,
    pub scan_issues: Vec<ScanIssue>,
    pub extraction_errors: Vec<ExtractionIssue>,
    pub manifest_issues: Vec<ManifestReadIssue>,
}

impl RepositoryIndex {
    /// Combine a scan and its extraction batch with the project's dependency manifests.
    pub fn assemble(
        root: &Path,
        files: &[SourceFile],
        scan_issues: Vec<ScanIssue>,
        batch: ExtractionBatch,
    ) -> Self {
        let manifests = read_manifests(root);
        let tech_stack = build_tech_stack(&manifests, files);

        let mut symbols = Vec::new();
        let mut exports = Vec::new();
        let mut imports = Vec::new();
        for extraction in batch.files {
            symbols.extend(extraction.symbols);
            exports.extend(extraction.exports);
            imports.extend(extraction.imports);
        }

        let findings = detect_patterns(&batch.signals, &symbols, &manifests.dependency_names());
        let api_surface = build_api_surface(manifests.package_json.as_ref(), files, &exports);

        RepositoryIndex {
            files: files.iter().map(|f| f.relative.clone()).collect(),
            symbols: SymbolRegistry::from_records(symbols),
            exports: ExportRegistry::from_edges(exports),
            imports: ImportGraph::from_edges(imports),
            tech_stack,
            patterns: PatternReport::new(RULESET_VERSION, findings),
            api_surface,
            scan_issues,
            extraction_errors: batch.errors,
            manifest_issues: manifests.issues,
        }
    }

    /// Fresh auto-region content for one manifest.
    pub fn auto_region(&self, kind: ManifestKind) -> Result<AutoRegion, ManifestError> {
        match kind {
            ManifestKind::Symbols => AutoRegion::from_content(&self.symbols),
            ManifestKind::Exports => AutoRegion::from_content(&self.exports),
            ManifestKind::Imports => AutoRegion::from_content(&self.imports),
            ManifestKind::TechStack => AutoRegion::from_content(&self.tech_stack),
            ManifestKind::Patterns => AutoRegion::from_content(&self.patterns),
            ManifestKind::ApiSurface => AutoRegion::from_content(&self.api_surface),
        }
    }

    /// Items the current tree yields for one manifest, grouped by file.
    pub fn key_index(&self, kind: ManifestKind) -> KeyIndex {
        match kind {
            ManifestKind::Symbols => self.symbols.key_index(),
            ManifestKind::Exports => self.exports.key_index(),
            ManifestKind::Imports => self.imports.key_index(),
            ManifestKind::TechStack => self.tech_stack.key_index(),
            ManifestKind::Patterns => self.patterns.key_index(),
            ManifestKind::ApiSurface => self.api_surface.key_index(),
        }
    }
}
