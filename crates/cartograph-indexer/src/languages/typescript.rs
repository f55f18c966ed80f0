//! TypeScript extractor and type-annotation helpers
//!
//! The JavaScript grammar is a subset of these node shapes, so the parameter
//! and return-type helpers serve both extractors.

use std::path::Path;

use cartograph_core::{Parameter, ParseOptions};
use tree_sitter::Node;

use super::declarations::extract_file;
use super::{collapse_whitespace, node_text};
use crate::extractor::{ExtractError, FileExtraction, LanguageExtractor};
use crate::parser_pool::FileType;

pub struct TypeScriptExtractor;

impl LanguageExtractor for TypeScriptExtractor {
    fn extract(
        &self,
        path: &str,
        source: &str,
        options: &ParseOptions,
    ) -> Result<FileExtraction, ExtractError> {
        let file_type = FileType::from_path(Path::new(path))
            .filter(FileType::is_typescript)
            .unwrap_or(FileType::TypeScript);
        extract_file(path, source, file_type, options)
    }
}

/// Formal parameters of a function, method or arrow function.
pub(crate) fn parameters(callable: Node, source: &str) -> Vec<Parameter> {
    // `x => x` has a single bare parameter.
    if let Some(single) = callable.child_by_field_name("parameter") {
        return vec![Parameter {
            name: node_text(single, source).to_string(),
            type_text: None,
            optional: false,
        }];
    }
    let Some(list) = callable.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter_map(|param| parameter(param, source))
        .collect()
}

fn parameter(node: Node, source: &str) -> Option<Parameter> {
    let text = |n: Node| collapse_whitespace(node_text(n, source));
    match node.kind() {
        "required_parameter" | "optional_parameter" => {
            let pattern = node.child_by_field_name("pattern")?;
            Some(Parameter {
                name: text(pattern),
                type_text: node
                    .child_by_field_name("type")
                    .map(|t| annotation_text(t, source)),
                optional: node.kind() == "optional_parameter"
                    || node.child_by_field_name("value").is_some(),
            })
        }
        "assignment_pattern" => Some(Parameter {
            name: text(node.child_by_field_name("left")?),
            type_text: None,
            optional: true,
        }),
        "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => Some(Parameter {
            name: text(node),
            type_text: None,
            optional: false,
        }),
        _ => None,
    }
}

/// Declared return type without the leading colon.
pub(crate) fn return_type(callable: Node, source: &str) -> Option<String> {
    callable
        .child_by_field_name("return_type")
        .map(|annotation| annotation_text(annotation, source))
        .filter(|text| !text.is_empty())
}

fn annotation_text(annotation: Node, source: &str) -> String {
    collapse_whitespace(node_text(annotation, source).trim_start_matches(':').trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartograph_core::{ParseMode, SymbolKind};

    fn extract(path: &str, source: &str) -> FileExtraction {
        let options = ParseOptions {
            mode: ParseMode::FileLocal,
            internal_import_prefixes: vec!["./".to_string()],
        };
        TypeScriptExtractor.extract(path, source, &options).unwrap()
    }

    #[test]
    fn test_parameter_shapes() {
        let source = "export function f(a: string, b = 2, c?: Map<string,\n  number>, ...rest: unknown[]): void {}\n";
        let result = extract("src/f.ts", source);
        let params = &result.symbols[0].parameters;
        let summary: Vec<_> = params
            .iter()
            .map(|p| (p.name.as_str(), p.type_text.as_deref(), p.optional))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a", Some("string"), false),
                ("b", None, true),
                ("c", Some("Map<string, number>"), true),
                ("...rest", Some("unknown[]"), false),
            ]
        );
        assert_eq!(result.symbols[0].return_type_text.as_deref(), Some("void"));
    }

    #[test]
    fn test_tsx_component() {
        let source = r#"
import { useState } from 'react';

export const Counter = ({ start }: { start: number }) => {
  const [count, setCount] = useState(start);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
};
"#;
        let result = extract("src/Counter.tsx", source);
        assert_eq!(result.symbols.len(), 1);
        let counter = &result.symbols[0];
        assert_eq!(counter.kind, SymbolKind::VariableFunction);
        assert!(counter.is_exported);
        assert_eq!(counter.parameters[0].type_text.as_deref(), Some("{ start: number }"));
        assert!(result.imports.is_empty());
    }

    #[test]
    fn test_declare_and_overloads() {
        let source = r#"
export function pick(a: string): string;
export function pick(a: number): number;
export function pick(a: any) { return a; }
declare function ambient(x: number): void;
export abstract class Shape {
  abstract area(): number;
}
"#;
        let result = extract("src/shapes.ts", source);
        let picks = result.symbols.iter().filter(|s| s.name == "pick").count();
        assert_eq!(picks, 3);
        assert!(result.symbols.iter().any(|s| s.name == "ambient" && !s.is_exported));
        let area = result
            .symbols
            .iter()
            .find(|s| s.qualified_name == "Shape.area")
            .unwrap();
        assert!(area.is_exported);
        assert_eq!(area.return_type_text.as_deref(), Some("number"));
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let options = ParseOptions {
            mode: ParseMode::FileLocal,
            internal_import_prefixes: vec![],
        };
        let err = TypeScriptExtractor
            .extract("src/bad.ts", "export function (((\n", &options)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Syntax { .. }));
    }
}
