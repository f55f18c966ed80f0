//! Per-thread tree-sitter parsers
//!
//! `tree_sitter::Parser` is not `Sync`, so each worker thread keeps its own
//! parser per grammar. Parsers are created on first use and reused for every
//! later file the thread handles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::extractor::ExtractError;

/// Grammar used to parse a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    TypeScript,
    Tsx,
    /// JavaScript, including JSX.
    JavaScript,
}

impl FileType {
    /// Determine the grammar from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ts" | "mts" | "cts" => Some(FileType::TypeScript),
            "tsx" => Some(FileType::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(FileType::JavaScript),
            _ => None,
        }
    }

    pub fn language(&self) -> Language {
        match self {
            FileType::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            FileType::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            FileType::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self, FileType::TypeScript | FileType::Tsx)
    }
}

thread_local! {
    static PARSERS: RefCell<HashMap<FileType, Parser>> = RefCell::new(HashMap::new());
}

/// Parse `source` with this thread's parser for `file_type`.
///
/// A tree containing error or missing nodes is rejected with the first offending line.
pub fn parse(file_type: FileType, source: &str) -> Result<Tree, ExtractError> {
    let tree = PARSERS.with(|cell| -> Result<Option<Tree>, ExtractError> {
        let mut parsers = cell.borrow_mut();
        if !parsers.contains_key(&file_type) {
            let mut parser = Parser::new();
            parser.set_language(&file_type.language())?;
            parsers.insert(file_type, parser);
        }
        Ok(parsers
            .get_mut(&file_type)
            .and_then(|parser| parser.parse(source, None)))
    })?;

    let tree = tree.ok_or(ExtractError::NoTree)?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(ExtractError::Syntax { line });
    }
    Ok(tree)
}

/// 1-based line of the first error or missing node, in document order.
fn first_error_line(root: Node) -> Option<u32> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row as u32 + 1);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}
