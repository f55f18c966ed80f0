//! Language extractors for TypeScript and JavaScript sources

pub mod declarations;
pub mod javascript;
pub mod typescript;

use std::path::Path;

use tree_sitter::Node;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::FileType;

pub use javascript::JavaScriptExtractor;
pub use typescript::TypeScriptExtractor;

/// Get the extractor for a file based on its extension.
pub fn get_extractor(path: &Path) -> Option<&'static dyn LanguageExtractor> {
    match FileType::from_path(path)? {
        FileType::TypeScript | FileType::Tsx => Some(&TypeScriptExtractor),
        FileType::JavaScript => Some(&JavaScriptExtractor),
    }
}

pub(crate) fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line on which `node` starts.
pub(crate) fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Value of a string literal, or of a template literal without substitutions.
pub(crate) fn string_value(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {}
        "template_string" => {
            let mut cursor = node.walk();
            if node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "template_substitution")
            {
                return None;
            }
        }
        _ => return None,
    }
    let text = node_text(node, source);
    let inner = text
        .strip_prefix(['"', '\'', '`'])
        .and_then(|t| t.strip_suffix(['"', '\'', '`']))
        .unwrap_or(text);
    Some(inner.to_string())
}

/// Text of `node` without leading decorators, cut where its body starts.
pub(crate) fn head_text(node: Node, source: &str) -> String {
    let mut cursor = node.walk();
    let start = node
        .children(&mut cursor)
        .find(|c| c.kind() != "decorator" && c.kind() != "comment")
        .map(|c| c.start_byte())
        .unwrap_or_else(|| node.start_byte());
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let text = source.get(start..end.max(start)).unwrap_or("");
    collapse_whitespace(text.trim_end_matches(';'))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `node` has an unnamed `async` child.
pub(crate) fn has_async_keyword(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}

pub(crate) fn is_callable(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}
