//! JavaScript extractor and CommonJS module handling

use cartograph_core::{ExportKind, ParseOptions};
use tree_sitter::Node;

use super::declarations::{Declaration, DeclarationVisitor, PendingExport, extract_file};
use super::{is_callable, line_of, node_text, string_value};
use crate::extractor::{ExtractError, FileExtraction, LanguageExtractor};
use crate::parser_pool::FileType;

pub struct JavaScriptExtractor;

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(
        &self,
        path: &str,
        source: &str,
        options: &ParseOptions,
    ) -> Result<FileExtraction, ExtractError> {
        extract_file(path, source, FileType::JavaScript, options)
    }
}

/// Handle `module.exports = …`, `exports.name = …` and `module.exports.name = …`.
pub(crate) fn visit_commonjs<'t>(visitor: &mut DeclarationVisitor<'t, '_>, statement: Node<'t>) {
    let Some(expression) = statement.named_child(0) else {
        return;
    };
    if expression.kind() != "assignment_expression" {
        return;
    }
    let (Some(left), Some(right)) = (
        expression.child_by_field_name("left"),
        expression.child_by_field_name("right"),
    ) else {
        return;
    };
    if left.kind() != "member_expression" {
        return;
    }
    let line = line_of(statement);
    let target = visitor.text(left);

    if target == "module.exports" {
        visit_module_exports(visitor, right, line);
        return;
    }

    let (Some(object), Some(property)) = (
        left.child_by_field_name("object"),
        left.child_by_field_name("property"),
    ) else {
        return;
    };
    if !matches!(visitor.text(object), "exports" | "module.exports") {
        return;
    }
    let name = visitor.text(property).to_string();
    export_binding(visitor, statement, target.to_string(), name, right, line);
}

fn visit_module_exports<'t>(visitor: &mut DeclarationVisitor<'t, '_>, value: Node<'t>, line: u32) {
    match value.kind() {
        "identifier" => visitor.pending.push(PendingExport {
            local: visitor.text(value).to_string(),
            exported: "default".to_string(),
            line,
        }),
        "object" => {
            let mut cursor = value.walk();
            let members: Vec<Node<'t>> = value.named_children(&mut cursor).collect();
            for member in members {
                match member.kind() {
                    "shorthand_property_identifier" => {
                        let name = visitor.text(member).to_string();
                        visitor.pending.push(PendingExport {
                            local: name.clone(),
                            exported: name,
                            line: line_of(member),
                        });
                    }
                    "pair" => {
                        let (Some(key), Some(inner)) = (
                            member.child_by_field_name("key"),
                            member.child_by_field_name("value"),
                        ) else {
                            continue;
                        };
                        let name = visitor
                            .text(key)
                            .trim_matches(|c| c == '"' || c == '\'')
                            .to_string();
                        let target = format!("module.exports.{}", name);
                        export_binding(visitor, member, target, name, inner, line_of(member));
                    }
                    "method_definition" => {
                        if let Some(key) = member.child_by_field_name("name") {
                            let name = visitor.text(key).to_string();
                            visitor
                                .exports
                                .push((name, ExportKind::Function, line_of(member)));
                        }
                    }
                    _ => {}
                }
            }
        }
        kind => {
            // Named function expressions get a symbol, like `export default function name()`.
            if is_callable(value) && kind != "arrow_function" {
                if let Some(name) = value.child_by_field_name("name") {
                    let name = visitor.text(name).to_string();
                    visitor.declarations.push(Declaration::Function {
                        node: value,
                        name: name.clone(),
                    });
                    visitor.exported_locals.insert(name);
                }
            }
            visitor
                .exports
                .push(("default".to_string(), ExportKind::Default, line));
        }
    }
}

/// Export `value` under `name`, recording a symbol when the value is a function.
fn export_binding<'t>(
    visitor: &mut DeclarationVisitor<'t, '_>,
    binding: Node<'t>,
    target: String,
    name: String,
    value: Node<'t>,
    line: u32,
) {
    if is_callable(value) {
        visitor.exported_locals.insert(name.clone());
        visitor.exports.push((name.clone(), ExportKind::Function, line));
        visitor.declarations.push(Declaration::VariableFunction {
            binding,
            callable: value,
            name,
            target,
        });
    } else if value.kind() == "identifier" {
        visitor.pending.push(PendingExport {
            local: visitor.text(value).to_string(),
            exported: name,
            line,
        });
    } else {
        visitor.exports.push((name, ExportKind::Variable, line));
    }
}

/// Collect specifiers of `require("…")` and `import("…")` calls anywhere in the tree.
pub(crate) fn collect_module_calls(root: Node, source: &str, specifiers: &mut Vec<String>) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.kind() == "call_expression" {
            if let Some(specifier) = module_call_specifier(node, source) {
                specifiers.push(specifier);
            }
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn module_call_specifier(call: Node, source: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    let is_module_call = match function.kind() {
        "import" => true,
        "identifier" => node_text(function, source) == "require",
        _ => false,
    };
    if !is_module_call {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    string_value(first, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartograph_core::{ParseMode, SymbolKind};

    fn extract(source: &str) -> FileExtraction {
        let options = ParseOptions {
            mode: ParseMode::FileLocal,
            internal_import_prefixes: vec!["./".to_string(), "../".to_string()],
        };
        JavaScriptExtractor.extract("lib/index.js", source, &options).unwrap()
    }

    #[test]
    fn test_commonjs_exports() {
        let source = r#"
const path = require('path');
const util = require('./util');

function parse(input) { return util.clean(input); }

exports.format = function (value, options = {}) { return String(value); };
exports.parse = parse;
module.exports.VERSION = '1.0.0';
"#;
        let result = extract(source);

        let format = result.symbols.iter().find(|s| s.name == "format").unwrap();
        assert_eq!(format.kind, SymbolKind::VariableFunction);
        assert!(format.is_exported);
        assert_eq!(format.signature_text, "exports.format = function (value, options = {})");
        assert_eq!(format.parameters.len(), 2);
        assert!(format.parameters[1].optional);

        let parse = result.symbols.iter().find(|s| s.name == "parse").unwrap();
        assert!(parse.is_exported);

        let exports: Vec<_> = result
            .exports
            .iter()
            .map(|e| (e.exported_name.as_str(), e.declaration_kind))
            .collect();
        assert!(exports.contains(&("format", ExportKind::Function)));
        assert!(exports.contains(&("parse", ExportKind::Function)));
        assert!(exports.contains(&("VERSION", ExportKind::Variable)));

        let specs: Vec<_> = result.imports.iter().map(|i| i.module_specifier.as_str()).collect();
        assert_eq!(specs, vec!["./util"]);
    }

    #[test]
    fn test_module_exports_object() {
        let source = r#"
async function start() {}
const stop = () => {};
module.exports = { start, stop, restart: async () => { await stop(); await start(); } };
"#;
        let result = extract(source);
        assert!(result.symbols.iter().all(|s| s.is_exported), "{:#?}", result.symbols);
        let restart = result.symbols.iter().find(|s| s.name == "restart").unwrap();
        assert!(restart.is_async);
        assert_eq!(restart.signature_text, "module.exports.restart = async ()");
        assert_eq!(result.exports.len(), 3);
    }

    #[test]
    fn test_module_exports_default_identifier() {
        let result = extract("class Queue { push(x) {} }\nmodule.exports = Queue;\n");
        assert!(result.symbols.iter().all(|s| s.is_exported));
        assert_eq!(result.exports[0].exported_name, "default");
        assert_eq!(result.exports[0].declaration_kind, ExportKind::Default);
    }

    #[test]
    fn test_module_exports_named_function() {
        let result = extract("module.exports = async function start(opts) { return opts; };\n");
        assert_eq!(result.symbols.len(), 1, "{:#?}", result.symbols);
        let start = &result.symbols[0];
        assert_eq!(start.name, "start");
        assert!(start.is_exported);
        assert!(start.is_async);
        assert_eq!(result.exports.len(), 1);
        assert_eq!(result.exports[0].exported_name, "default");
        assert_eq!(result.exports[0].declaration_kind, ExportKind::Default);

        let anonymous = extract("module.exports = function (opts) {};\n");
        assert!(anonymous.symbols.is_empty());
        assert_eq!(anonymous.exports[0].exported_name, "default");
    }

    #[test]
    fn test_esm_in_javascript() {
        let source = "import { a } from './a.js';\nexport default function main() { return a; }\n";
        let result = extract(source);
        assert_eq!(result.symbols.len(), 1);
        assert!(result.symbols[0].is_exported);
        assert_eq!(result.imports[0].module_specifier, "./a.js");
    }
}
