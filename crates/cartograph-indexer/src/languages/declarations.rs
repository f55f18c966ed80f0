//! Top-level declaration visitor shared by the TypeScript and JavaScript extractors
//!
//! The visitor walks the statements of a program once. Every named declaration it
//! recognises becomes a [`Declaration`]; export statements, export clauses and
//! CommonJS assignments only record which top-level names are exported. Export
//! status is applied when the file is finished, so `export { a }` may precede the
//! declaration of `a`, and class members inherit the status of their class.

use std::collections::{BTreeSet, HashMap, HashSet};

use cartograph_core::{ExportEdge, ExportKind, ImportEdge, ParseOptions, SymbolKind, SymbolRecord};
use tree_sitter::Node;

use super::{head_text, is_callable, line_of, node_text, string_value};
use super::{javascript, typescript};
use crate::extractor::{ExtractError, FileExtraction};
use crate::heuristics::SourceSignals;
use crate::parser_pool::{self, FileType};

/// A declaration shape recognised by the visitor.
#[derive(Debug, Clone)]
pub(crate) enum Declaration<'t> {
    Function {
        node: Node<'t>,
        name: String,
    },
    /// A member of a class or interface. `callable` is the member itself for
    /// methods, or the function value of a field such as `onClick = () => {}`.
    Method {
        node: Node<'t>,
        callable: Node<'t>,
        container: String,
        name: String,
    },
    Class {
        node: Node<'t>,
        name: String,
    },
    Interface {
        node: Node<'t>,
        name: String,
    },
    /// A function value bound to a name. `target` is the binding as written,
    /// e.g. `const handler` or `exports.handler`.
    VariableFunction {
        binding: Node<'t>,
        callable: Node<'t>,
        name: String,
        target: String,
    },
}

impl<'t> Declaration<'t> {
    /// Top-level name whose export status this declaration takes.
    fn owner(&self) -> &str {
        match self {
            Declaration::Method { container, .. } => container,
            Declaration::Function { name, .. }
            | Declaration::Class { name, .. }
            | Declaration::Interface { name, .. }
            | Declaration::VariableFunction { name, .. } => name,
        }
    }

    fn lower(&self, path: &str, source: &str, is_exported: bool) -> SymbolRecord {
        let record = |name: &str,
                      qualified_name: String,
                      kind: SymbolKind,
                      line_node: Node,
                      signature_text: String,
                      callable: Option<Node>| SymbolRecord {
            name: name.to_string(),
            qualified_name,
            kind,
            file_path: path.to_string(),
            start_line: line_of(line_node),
            signature_text,
            is_async: callable.is_some_and(super::has_async_keyword),
            is_exported,
            parameters: callable
                .map(|c| typescript::parameters(c, source))
                .unwrap_or_default(),
            return_type_text: callable.and_then(|c| typescript::return_type(c, source)),
        };

        match self {
            Declaration::Function { node, name } => record(
                name,
                name.clone(),
                SymbolKind::Function,
                *node,
                head_text(*node, source),
                Some(*node),
            ),
            Declaration::Method {
                node,
                callable,
                container,
                name,
            } => {
                let signature = if node == callable {
                    head_text(*node, source)
                } else {
                    format!("{} = {}", name, callable_head(*callable, source))
                };
                record(
                    name,
                    format!("{}.{}", container, name),
                    SymbolKind::Method,
                    *node,
                    signature,
                    Some(*callable),
                )
            }
            Declaration::Class { node, name } => record(
                name,
                name.clone(),
                SymbolKind::Class,
                *node,
                head_text(*node, source),
                None,
            ),
            Declaration::Interface { node, name } => record(
                name,
                name.clone(),
                SymbolKind::Interface,
                *node,
                head_text(*node, source),
                None,
            ),
            Declaration::VariableFunction {
                binding,
                callable,
                name,
                target,
            } => record(
                name,
                name.clone(),
                SymbolKind::VariableFunction,
                *binding,
                format!("{} = {}", target, callable_head(*callable, source)),
                Some(*callable),
            ),
        }
    }
}

/// Head of a function value with any trailing arrow removed.
fn callable_head(callable: Node, source: &str) -> String {
    let head = head_text(callable, source);
    head.trim_end_matches("=>").trim_end().to_string()
}

/// A named export whose declaration kind is resolved once the file is finished.
#[derive(Debug)]
pub(crate) struct PendingExport {
    pub local: String,
    pub exported: String,
    pub line: u32,
}

pub(crate) struct DeclarationVisitor<'t, 's> {
    pub source: &'s str,
    pub declarations: Vec<Declaration<'t>>,
    /// Top-level names declared in the file, with their export kind and line.
    pub locals: HashMap<String, (ExportKind, u32)>,
    /// Names bound by import statements.
    pub imported: HashSet<String>,
    pub exported_locals: HashSet<String>,
    pub exports: Vec<(String, ExportKind, u32)>,
    pub pending: Vec<PendingExport>,
    pub specifiers: Vec<String>,
}

impl<'t, 's> DeclarationVisitor<'t, 's> {
    pub fn new(source: &'s str) -> Self {
        DeclarationVisitor {
            source,
            declarations: Vec::new(),
            locals: HashMap::new(),
            imported: HashSet::new(),
            exported_locals: HashSet::new(),
            exports: Vec::new(),
            pending: Vec::new(),
            specifiers: Vec::new(),
        }
    }

    pub fn text(&self, node: Node) -> &'s str {
        node_text(node, self.source)
    }

    pub fn visit_program(&mut self, root: Node<'t>) {
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            match statement.kind() {
                "export_statement" => self.visit_export(statement),
                "import_statement" => self.visit_import(statement),
                "expression_statement" => javascript::visit_commonjs(self, statement),
                _ => {
                    self.visit_declaration(statement);
                }
            }
        }
    }

    /// Record a declaration statement. Returns the top-level names it binds.
    pub fn visit_declaration(&mut self, node: Node<'t>) -> Vec<(String, ExportKind, u32)> {
        let mut bound = Vec::new();
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());

        match (node.kind(), name) {
            (
                "function_declaration" | "generator_function_declaration" | "function_signature",
                Some(name),
            ) => {
                bound.push((name.clone(), ExportKind::Function, line_of(node)));
                self.declarations.push(Declaration::Function { node, name });
            }
            ("class_declaration" | "abstract_class_declaration", Some(name)) => {
                bound.push((name.clone(), ExportKind::Class, line_of(node)));
                self.declarations.push(Declaration::Class {
                    node,
                    name: name.clone(),
                });
                self.visit_members(node, &name);
            }
            ("interface_declaration", Some(name)) => {
                bound.push((name.clone(), ExportKind::Interface, line_of(node)));
                self.declarations.push(Declaration::Interface {
                    node,
                    name: name.clone(),
                });
                self.visit_members(node, &name);
            }
            ("type_alias_declaration", Some(name)) => {
                bound.push((name, ExportKind::Type, line_of(node)));
            }
            ("enum_declaration", Some(name)) => {
                bound.push((name, ExportKind::Enum, line_of(node)));
            }
            ("lexical_declaration" | "variable_declaration", _) => {
                bound.extend(self.visit_variables(node));
            }
            ("ambient_declaration", _) => {
                let mut cursor = node.walk();
                let inner: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
                for child in inner {
                    bound.extend(self.visit_declaration(child));
                }
            }
            _ => {}
        }

        for (name, kind, line) in &bound {
            self.locals.insert(name.clone(), (*kind, *line));
        }
        bound
    }

    fn visit_variables(&mut self, node: Node<'t>) -> Vec<(String, ExportKind, u32)> {
        let keyword = node
            .child(0)
            .map(|k| self.text(k).to_string())
            .unwrap_or_else(|| "var".to_string());
        let mut bound = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            // Destructuring patterns bind no single name.
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = self.text(name_node).to_string();
            match declarator.child_by_field_name("value") {
                Some(value) if is_callable(value) => {
                    bound.push((name.clone(), ExportKind::Function, line_of(declarator)));
                    self.declarations.push(Declaration::VariableFunction {
                        binding: declarator,
                        callable: value,
                        target: format!("{} {}", keyword, name),
                        name,
                    });
                }
                _ => bound.push((name, ExportKind::Variable, line_of(declarator))),
            }
        }
        bound
    }

    /// Methods and function-valued fields of a class, and method signatures of an interface.
    fn visit_members(&mut self, container: Node<'t>, container_name: &str) {
        let Some(body) = container.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" | "method_signature" | "abstract_method_signature" => {
                    if let Some(name) = member.child_by_field_name("name") {
                        self.declarations.push(Declaration::Method {
                            node: member,
                            callable: member,
                            container: container_name.to_string(),
                            name: self.text(name).to_string(),
                        });
                    }
                }
                "public_field_definition" | "field_definition" => {
                    let name = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"));
                    let value = member.child_by_field_name("value");
                    if let (Some(name), Some(value)) = (name, value) {
                        if is_callable(value) {
                            self.declarations.push(Declaration::Method {
                                node: member,
                                callable: value,
                                container: container_name.to_string(),
                                name: self.text(name).to_string(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_export(&mut self, node: Node<'t>) {
        let line = line_of(node);

        if let Some(source) = node.child_by_field_name("source") {
            if let Some(specifier) = string_value(source, self.source) {
                self.specifiers.push(specifier);
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
            let mut named = false;
            for child in children {
                match child.kind() {
                    "export_clause" => {
                        named = true;
                        for (name, alias) in self.export_specifiers(child) {
                            self.exports.push((alias.unwrap_or(name), ExportKind::ReExport, line));
                        }
                    }
                    "namespace_export" => {
                        named = true;
                        let name = self.text(child).trim_start_matches('*').trim();
                        let name = name.trim_start_matches("as").trim().to_string();
                        self.exports.push((name, ExportKind::ReExport, line));
                    }
                    _ => {}
                }
            }
            if !named {
                self.exports.push(("*".to_string(), ExportKind::ReExport, line));
            }
            return;
        }

        let is_default = {
            let mut cursor = node.walk();
            let found = node.children(&mut cursor).any(|c| c.kind() == "default");
            found
        };

        if let Some(declaration) = node.child_by_field_name("declaration") {
            for (name, kind, decl_line) in self.visit_declaration(declaration) {
                self.exported_locals.insert(name.clone());
                if is_default {
                    self.exports.push(("default".to_string(), ExportKind::Default, decl_line));
                } else {
                    self.exports.push((name, kind, decl_line));
                }
            }
            return;
        }

        if is_default {
            if let Some(value) = node.child_by_field_name("value") {
                let name = value
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string());
                match (value.kind(), name) {
                    ("identifier", _) => {
                        self.pending.push(PendingExport {
                            local: self.text(value).to_string(),
                            exported: "default".to_string(),
                            line,
                        });
                        return;
                    }
                    ("class", Some(name)) => {
                        self.declarations.push(Declaration::Class {
                            node: value,
                            name: name.clone(),
                        });
                        self.visit_members(value, &name);
                        self.exported_locals.insert(name);
                    }
                    (kind, Some(name)) if is_callable(value) && kind != "arrow_function" => {
                        self.declarations.push(Declaration::Function {
                            node: value,
                            name: name.clone(),
                        });
                        self.exported_locals.insert(name);
                    }
                    _ => {}
                }
            }
            self.exports.push(("default".to_string(), ExportKind::Default, line));
            return;
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "export_clause" {
                for (name, alias) in self.export_specifiers(child) {
                    self.pending.push(PendingExport {
                        exported: alias.unwrap_or_else(|| name.clone()),
                        local: name,
                        line,
                    });
                }
            }
        }
    }

    fn export_specifiers(&self, clause: Node<'t>) -> Vec<(String, Option<String>)> {
        let mut cursor = clause.walk();
        clause
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "export_specifier")
            .filter_map(|spec| {
                let name = spec.child_by_field_name("name")?;
                let alias = spec
                    .child_by_field_name("alias")
                    .map(|a| unquote(self.text(a)));
                Some((unquote(self.text(name)), alias))
            })
            .collect()
    }

    fn visit_import(&mut self, node: Node<'t>) {
        let source = node.child_by_field_name("source").or_else(|| {
            let mut cursor = node.walk();
            let require = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "import_require_clause");
            require.and_then(|clause| clause.child_by_field_name("source"))
        });
        if let Some(specifier) = source.and_then(|s| string_value(s, self.source)) {
            self.specifiers.push(specifier);
        }

        let mut cursor = node.walk();
        let clauses: Vec<Node<'t>> = node
            .named_children(&mut cursor)
            .filter(|c| matches!(c.kind(), "import_clause" | "import_require_clause"))
            .collect();
        for clause in clauses {
            self.collect_identifiers(clause);
        }
    }

    fn collect_identifiers(&mut self, node: Node<'t>) {
        if node.kind() == "identifier" {
            self.imported.insert(self.text(node).to_string());
            return;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect_identifiers(child);
        }
    }

    pub fn finish(self, path: &str, options: &ParseOptions, signals: SourceSignals) -> FileExtraction {
        let DeclarationVisitor {
            source,
            declarations,
            locals,
            imported,
            mut exported_locals,
            mut exports,
            pending,
            specifiers,
        } = self;

        for PendingExport { local, exported, line } in pending {
            let kind_and_line = match locals.get(&local) {
                Some((kind, decl_line)) => {
                    exported_locals.insert(local.clone());
                    Some((*kind, *decl_line))
                }
                None if imported.contains(&local) => Some((ExportKind::ReExport, line)),
                None => None,
            };
            let (kind, line) = kind_and_line.unwrap_or((ExportKind::Variable, line));
            let kind = if exported == "default" { ExportKind::Default } else { kind };
            exports.push((exported, kind, line));
        }

        let mut symbols: Vec<SymbolRecord> = declarations
            .iter()
            .map(|decl| decl.lower(path, source, exported_locals.contains(decl.owner())))
            .collect();
        symbols.sort_by(|a, b| (a.start_line, &a.qualified_name).cmp(&(b.start_line, &b.qualified_name)));

        exports.sort_by(|a, b| (a.2, &a.0, a.1).cmp(&(b.2, &b.0, b.1)));
        exports.dedup();
        let exports = exports
            .into_iter()
            .map(|(exported_name, declaration_kind, start_line)| ExportEdge {
                file_path: path.to_string(),
                exported_name,
                declaration_kind,
                start_line,
            })
            .collect();

        let imports = specifiers
            .into_iter()
            .filter(|s| options.is_internal_specifier(s))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|module_specifier| ImportEdge {
                from_file: path.to_string(),
                module_specifier,
            })
            .collect();

        FileExtraction {
            path: path.to_string(),
            symbols,
            exports,
            imports,
            signals,
        }
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// Parse `source` with `file_type` and extract its top-level records.
pub(crate) fn extract_file(
    path: &str,
    source: &str,
    file_type: FileType,
    options: &ParseOptions,
) -> Result<FileExtraction, ExtractError> {
    let tree = parser_pool::parse(file_type, source)?;
    let root = tree.root_node();

    let mut visitor = DeclarationVisitor::new(source);
    visitor.visit_program(root);
    javascript::collect_module_calls(root, source, &mut visitor.specifiers);
    let signals = SourceSignals::collect(root, source);

    Ok(visitor.finish(path, options, signals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartograph_core::ParseMode;

    fn options() -> ParseOptions {
        ParseOptions {
            mode: ParseMode::FileLocal,
            internal_import_prefixes: vec!["./".to_string(), "../".to_string()],
        }
    }

    fn extract(source: &str) -> FileExtraction {
        extract_file("src/mod.ts", source, FileType::TypeScript, &options()).unwrap()
    }

    fn symbol<'a>(result: &'a FileExtraction, qualified: &str) -> &'a SymbolRecord {
        result
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("no symbol {qualified} in {:#?}", result.symbols))
    }

    #[test]
    fn test_exported_async_function() {
        let result = extract("export async function foo(a: string, b?: number): Promise<void> {}\n");
        assert_eq!(result.symbols.len(), 1);
        let foo = &result.symbols[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.kind, SymbolKind::Function);
        assert!(foo.is_async);
        assert!(foo.is_exported);
        assert_eq!(foo.start_line, 1);
        assert_eq!(foo.signature_text, "async function foo(a: string, b?: number): Promise<void>");
        assert_eq!(foo.return_type_text.as_deref(), Some("Promise<void>"));
        assert_eq!(foo.parameters.len(), 2);
        assert_eq!(foo.parameters[1].name, "b");
        assert!(foo.parameters[1].optional);
        assert_eq!(foo.parameters[0].type_text.as_deref(), Some("string"));
        assert_eq!(result.exports[0].exported_name, "foo");
        assert_eq!(result.exports[0].declaration_kind, ExportKind::Function);
    }

    #[test]
    fn test_class_members_inherit_export_status() {
        let source = r#"
export class Store {
  private items: string[] = [];
  onChange = (next: string) => { this.items.push(next); };
  async load(): Promise<void> {}
  static create() { return new Store(); }
}

class Hidden {
  run() {}
}
"#;
        let result = extract(source);
        let load = symbol(&result, "Store.load");
        assert_eq!(load.kind, SymbolKind::Method);
        assert_eq!(load.name, "load");
        assert!(load.is_async && load.is_exported);
        assert_eq!(load.start_line, 5);

        let on_change = symbol(&result, "Store.onChange");
        assert_eq!(on_change.signature_text, "onChange = (next: string)");
        assert!(symbol(&result, "Store.create").is_exported);
        assert!(!symbol(&result, "Hidden.run").is_exported);
        assert!(!symbol(&result, "Hidden").is_exported);
        // `items` is a plain field, not a callable.
        assert!(result.symbols.iter().all(|s| s.name != "items"));
    }

    #[test]
    fn test_variable_functions_and_export_clause() {
        let source = r#"
export { helper, format as formatValue };
const helper = (x: number): number => x * 2;
const format = function (value) { return String(value); };
let counter = 0;
function internal() {}
"#;
        let result = extract(source);
        let helper = symbol(&result, "helper");
        assert_eq!(helper.kind, SymbolKind::VariableFunction);
        assert!(helper.is_exported);
        assert_eq!(helper.signature_text, "const helper = (x: number): number");
        assert_eq!(helper.start_line, 3);
        assert!(symbol(&result, "format").is_exported);
        assert!(!symbol(&result, "internal").is_exported);
        assert!(result.symbols.iter().all(|s| s.name != "counter"));

        let names: Vec<_> = result.exports.iter().map(|e| e.exported_name.as_str()).collect();
        assert_eq!(names, vec!["helper", "formatValue"]);
        assert!(result.exports.iter().all(|e| e.declaration_kind == ExportKind::Function));
    }

    #[test]
    fn test_interfaces_types_and_enums() {
        let source = r#"
export interface Repo {
  find(id: string): Promise<Item>;
}
export type Id = string;
export enum Color { Red, Green }
"#;
        let result = extract(source);
        assert_eq!(symbol(&result, "Repo").kind, SymbolKind::Interface);
        let find = symbol(&result, "Repo.find");
        assert_eq!(find.return_type_text.as_deref(), Some("Promise<Item>"));
        assert!(find.is_exported);

        let kinds: Vec<_> = result
            .exports
            .iter()
            .map(|e| (e.exported_name.as_str(), e.declaration_kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Repo", ExportKind::Interface),
                ("Id", ExportKind::Type),
                ("Color", ExportKind::Enum)
            ]
        );
    }

    #[test]
    fn test_imports_keep_only_internal_specifiers() {
        let source = r#"
import React from 'react';
import { a } from './a';
import type { B } from '../types/b';
export * from './all';
export { c as see } from './c';
const lazy = () => import('./lazy');
"#;
        let result = extract(source);
        let specs: Vec<_> = result.imports.iter().map(|i| i.module_specifier.as_str()).collect();
        assert_eq!(specs, vec!["../types/b", "./a", "./all", "./c", "./lazy"]);

        let reexports: Vec<_> = result
            .exports
            .iter()
            .filter(|e| e.declaration_kind == ExportKind::ReExport)
            .map(|e| e.exported_name.as_str())
            .collect();
        assert!(reexports.contains(&"*"));
        assert!(reexports.contains(&"see"));
    }

    #[test]
    fn test_default_exports() {
        let result = extract("function main() {}\nexport default main;\n");
        assert!(symbol(&result, "main").is_exported);
        assert_eq!(result.exports.len(), 1);
        assert_eq!(result.exports[0].exported_name, "default");
        assert_eq!(result.exports[0].declaration_kind, ExportKind::Default);
        assert_eq!(result.exports[0].start_line, 1);

        let result = extract("export default class App {}\n");
        assert!(symbol(&result, "App").is_exported);
        assert_eq!(result.exports[0].exported_name, "default");
    }

    #[test]
    fn test_nested_functions_are_not_symbols() {
        let result = extract("function outer() {\n  function inner() {}\n  const f = () => 1;\n}\n");
        let names: Vec<_> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer"]);
    }
}
