//! Core records extracted from a scanned repository

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// What kind of declaration a symbol was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    /// A function or arrow expression bound to a named variable.
    VariableFunction,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::VariableFunction => "variable-function",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One formal parameter of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// A named declaration found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    pub name: String,
    /// `Container.member` for methods, the plain name otherwise.
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// Relative to the scanned root, `/`-separated.
    pub file_path: String,
    /// 1-based.
    pub start_line: u32,
    pub signature_text: String,
    pub is_async: bool,
    pub is_exported: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type_text: Option<String>,
}

impl SymbolRecord {
    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            file_path: self.file_path.clone(),
            qualified_name: self.qualified_name.clone(),
            start_line: self.start_line,
        }
    }
}

/// Unique identity of a symbol within one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub file_path: String,
    pub qualified_name: String,
    pub start_line: u32,
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.file_path, self.qualified_name, self.start_line)
    }
}

/// How an exported name was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Variable,
    Default,
    ReExport,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Class => "class",
            ExportKind::Interface => "interface",
            ExportKind::Type => "type",
            ExportKind::Enum => "enum",
            ExportKind::Variable => "variable",
            ExportKind::Default => "default",
            ExportKind::ReExport => "re-export",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported name of one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEdge {
    pub file_path: String,
    pub exported_name: String,
    pub declaration_kind: ExportKind,
    pub start_line: u32,
}

/// A file's dependency on another in-project module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    pub from_file: String,
    pub module_specifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    ErrorHandling,
    StateManagement,
    DataFlow,
    Naming,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 4] = [
        PatternCategory::ErrorHandling,
        PatternCategory::StateManagement,
        PatternCategory::DataFlow,
        PatternCategory::Naming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::ErrorHandling => "error-handling",
            PatternCategory::StateManagement => "state-management",
            PatternCategory::DataFlow => "data-flow",
            PatternCategory::Naming => "naming",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PatternCategory::ErrorHandling => "Error handling",
            PatternCategory::StateManagement => "State management",
            PatternCategory::DataFlow => "Data flow",
            PatternCategory::Naming => "Naming",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository-wide convention detected by a heuristic rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternFinding {
    pub category: PatternCategory,
    pub description: String,
}

/// A dependency declared by a project manifest such as `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    pub version: String,
    /// The manifest file that declared it, relative to the root.
    pub source: String,
}

/// Languages, tooling and dependencies of the scanned project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    pub language: String,
    pub package_manager: Option<String>,
    pub dependencies: Vec<DependencyRef>,
    pub dev_dependencies: Vec<DependencyRef>,
    pub testing_framework: Option<String>,
    pub bundler: Option<String>,
    pub linter: Option<String>,
    pub formatter: Option<String>,
    pub frameworks: Vec<String>,
    pub build_tools: Vec<String>,
}

/// An exported name reachable from a package entry point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiExport {
    pub file: String,
    pub name: String,
    pub kind: ExportKind,
}

/// What the project exposes to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSurface {
    pub entry_points: Vec<String>,
    pub public_exports: Vec<ApiExport>,
    pub cli_commands: Vec<String>,
    pub scripts: BTreeMap<String, String>,
}

/// Express `path` relative to `root` with `/` separators.
///
/// Returns `None` when `path` is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = PathBuf::from("/repo");
        let path = root.join("src").join("lib").join("a.ts");
        assert_eq!(relative_path(&root, &path).as_deref(), Some("src/lib/a.ts"));
    }

    #[test]
    fn test_relative_path_outside_root() {
        let root = PathBuf::from("/repo");
        assert_eq!(relative_path(&root, Path::new("/elsewhere/a.ts")), None);
    }

    #[test]
    fn test_symbol_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&SymbolKind::VariableFunction).unwrap();
        assert_eq!(json, "\"variable-function\"");
    }

    #[test]
    fn test_symbol_key_display() {
        let key = SymbolKey {
            file_path: "src/a.ts".to_string(),
            qualified_name: "User.save".to_string(),
            start_line: 12,
        };
        assert_eq!(key.to_string(), "src/a.ts#User.save@12");
    }
}
