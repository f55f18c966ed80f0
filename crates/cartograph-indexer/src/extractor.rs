//! Language extractor trait definition

use cartograph_core::{ExportEdge, ImportEdge, ParseOptions, SymbolRecord};

use crate::heuristics::SourceSignals;

/// Why a single file produced no records.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8")]
    NotUtf8,

    #[error("unsupported file type")]
    Unsupported,

    #[error("failed to load grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error at line {line}")]
    Syntax { line: u32 },
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileExtraction {
    pub path: String,
    pub symbols: Vec<SymbolRecord>,
    pub exports: Vec<ExportEdge>,
    pub imports: Vec<ImportEdge>,
    pub signals: SourceSignals,
}

pub trait LanguageExtractor: Send + Sync {
    /// Extract records from one file. `path` is relative to the scan root.
    fn extract(
        &self,
        path: &str,
        source: &str,
        options: &ParseOptions,
    ) -> Result<FileExtraction, ExtractError>;
}
