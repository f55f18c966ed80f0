//! Typed auto-generated content for each manifest domain

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::manifest::{AutoRegion, ManifestKind};
use crate::model::{
    ApiSurface, ExportEdge, ExportKind, ImportEdge, PatternFinding, SymbolRecord, TechStack,
};

/// Key under which repository-wide entries are indexed.
pub const REPOSITORY_SCOPE: &str = "";

/// Coverage keys grouped by the file that produces them.
pub type KeyIndex = BTreeMap<String, BTreeSet<String>>;

/// Number of keys across all files of an index.
pub fn key_count(index: &KeyIndex) -> usize {
    index.values().map(BTreeSet::len).sum()
}

/// Content that can fill the auto-generated region of one manifest domain.
pub trait ManifestContent: Serialize + DeserializeOwned {
    const KIND: ManifestKind;

    /// Every item this content documents, grouped by source file.
    fn key_index(&self) -> KeyIndex;
}

/// Symbol registry: file → symbols declared in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRegistry {
    pub total_files: usize,
    pub total_symbols: usize,
    pub files: BTreeMap<String, Vec<SymbolRecord>>,
}

impl SymbolRegistry {
    pub fn from_records(records: impl IntoIterator<Item = SymbolRecord>) -> Self {
        let mut files: BTreeMap<String, Vec<SymbolRecord>> = BTreeMap::new();
        for record in records {
            files.entry(record.file_path.clone()).or_default().push(record);
        }
        for symbols in files.values_mut() {
            symbols.sort_by(|a, b| {
                (a.start_line, &a.qualified_name).cmp(&(b.start_line, &b.qualified_name))
            });
            symbols.dedup_by(|a, b| a.key() == b.key());
        }
        SymbolRegistry {
            total_files: files.len(),
            total_symbols: files.values().map(Vec::len).sum(),
            files,
        }
    }
}

impl ManifestContent for SymbolRegistry {
    const KIND: ManifestKind = ManifestKind::Symbols;

    fn key_index(&self) -> KeyIndex {
        self.files
            .iter()
            .map(|(file, symbols)| {
                let keys = symbols.iter().map(|s| s.key().to_string()).collect();
                (file.clone(), keys)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportEntry {
    pub name: String,
    pub kind: ExportKind,
    pub line: u32,
}

/// Export registry: file → exported names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRegistry {
    pub total_exports: usize,
    pub files: BTreeMap<String, Vec<ExportEntry>>,
}

impl ExportRegistry {
    pub fn from_edges(edges: impl IntoIterator<Item = ExportEdge>) -> Self {
        let mut files: BTreeMap<String, Vec<ExportEntry>> = BTreeMap::new();
        for edge in edges {
            files.entry(edge.file_path).or_default().push(ExportEntry {
                name: edge.exported_name,
                kind: edge.declaration_kind,
                line: edge.start_line,
            });
        }
        for entries in files.values_mut() {
            entries.sort_by(|a, b| (a.line, &a.name, a.kind).cmp(&(b.line, &b.name, b.kind)));
            entries.dedup();
        }
        ExportRegistry {
            total_exports: files.values().map(Vec::len).sum(),
            files,
        }
    }
}

impl ManifestContent for ExportRegistry {
    const KIND: ManifestKind = ManifestKind::Exports;

    fn key_index(&self) -> KeyIndex {
        self.files
            .iter()
            .map(|(file, entries)| {
                let keys = entries.iter().map(|e| format!("{}@{}", e.name, e.line)).collect();
                (file.clone(), keys)
            })
            .collect()
    }
}

/// Import graph: file → in-project module specifiers it imports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportGraph {
    pub total_edges: usize,
    pub files: BTreeMap<String, Vec<String>>,
}

impl ImportGraph {
    pub fn from_edges(edges: impl IntoIterator<Item = ImportEdge>) -> Self {
        let mut files: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for edge in edges {
            files.entry(edge.from_file).or_default().insert(edge.module_specifier);
        }
        let files: BTreeMap<String, Vec<String>> = files
            .into_iter()
            .map(|(file, specifiers)| (file, specifiers.into_iter().collect()))
            .collect();
        ImportGraph {
            total_edges: files.values().map(Vec::len).sum(),
            files,
        }
    }
}

impl ManifestContent for ImportGraph {
    const KIND: ManifestKind = ManifestKind::Imports;

    fn key_index(&self) -> KeyIndex {
        self.files
            .iter()
            .map(|(file, specifiers)| (file.clone(), specifiers.iter().cloned().collect()))
            .collect()
    }
}

impl ManifestContent for TechStack {
    const KIND: ManifestKind = ManifestKind::TechStack;

    fn key_index(&self) -> KeyIndex {
        let mut index = KeyIndex::new();
        let repo = index.entry(REPOSITORY_SCOPE.to_string()).or_default();
        repo.insert(format!("language:{}", self.language));
        let roles = [
            ("packageManager", &self.package_manager),
            ("testingFramework", &self.testing_framework),
            ("bundler", &self.bundler),
            ("linter", &self.linter),
            ("formatter", &self.formatter),
        ];
        for (role, value) in roles {
            if let Some(value) = value {
                repo.insert(format!("{}:{}", role, value));
            }
        }
        for dep in &self.dependencies {
            index
                .entry(dep.source.clone())
                .or_default()
                .insert(format!("dependency:{}", dep.name));
        }
        for dep in &self.dev_dependencies {
            index
                .entry(dep.source.clone())
                .or_default()
                .insert(format!("devDependency:{}", dep.name));
        }
        index
    }
}

/// Repository-wide pattern findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub ruleset_version: u32,
    pub findings: Vec<PatternFinding>,
}

impl PatternReport {
    pub fn new(ruleset_version: u32, findings: impl IntoIterator<Item = PatternFinding>) -> Self {
        let findings: BTreeSet<PatternFinding> = findings.into_iter().collect();
        PatternReport {
            ruleset_version,
            findings: findings.into_iter().collect(),
        }
    }
}

impl ManifestContent for PatternReport {
    const KIND: ManifestKind = ManifestKind::Patterns;

    fn key_index(&self) -> KeyIndex {
        let keys = self
            .findings
            .iter()
            .map(|f| format!("{}:{}", f.category, f.description))
            .collect();
        KeyIndex::from([(REPOSITORY_SCOPE.to_string(), keys)])
    }
}

impl ManifestContent for ApiSurface {
    const KIND: ManifestKind = ManifestKind::ApiSurface;

    fn key_index(&self) -> KeyIndex {
        let mut index = KeyIndex::new();
        let repo = index.entry(REPOSITORY_SCOPE.to_string()).or_default();
        repo.extend(self.entry_points.iter().map(|e| format!("entry:{}", e)));
        repo.extend(self.cli_commands.iter().map(|c| format!("command:{}", c)));
        for export in &self.public_exports {
            index
                .entry(export.file.clone())
                .or_default()
                .insert(format!("export:{}", export.name));
        }
        index
    }
}

/// Key index of a persisted auto region, read back through the typed content of `kind`.
pub fn documented_index(kind: ManifestKind, region: &AutoRegion) -> Result<KeyIndex, ManifestError> {
    let index = match kind {
        ManifestKind::Symbols => region.to_content::<SymbolRegistry>()?.key_index(),
        ManifestKind::Exports => region.to_content::<ExportRegistry>()?.key_index(),
        ManifestKind::Imports => region.to_content::<ImportGraph>()?.key_index(),
        ManifestKind::TechStack => region.to_content::<TechStack>()?.key_index(),
        ManifestKind::Patterns => region.to_content::<PatternReport>()?.key_index(),
        ManifestKind::ApiSurface => region.to_content::<ApiSurface>()?.key_index(),
    };
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyRef, PatternCategory, SymbolKind};

    fn symbol(file: &str, name: &str, line: u32) -> SymbolRecord {
        SymbolRecord {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: file.to_string(),
            start_line: line,
            signature_text: format!("function {}()", name),
            is_async: false,
            is_exported: false,
            parameters: vec![],
            return_type_text: None,
        }
    }

    #[test]
    fn test_symbol_registry_groups_and_sorts() {
        let registry = SymbolRegistry::from_records(vec![
            symbol("b.ts", "late", 9),
            symbol("a.ts", "only", 1),
            symbol("b.ts", "early", 2),
            symbol("b.ts", "early", 2),
        ]);

        assert_eq!(registry.total_files, 2);
        assert_eq!(registry.total_symbols, 3);
        let names: Vec<_> = registry.files["b.ts"].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert!(registry.key_index()["b.ts"].contains("b.ts#late@9"));
    }

    #[test]
    fn test_import_graph_dedups_specifiers() {
        let edge = |spec: &str| ImportEdge {
            from_file: "a.ts".to_string(),
            module_specifier: spec.to_string(),
        };
        let graph = ImportGraph::from_edges(vec![edge("./z"), edge("./b"), edge("./z")]);
        assert_eq!(graph.files["a.ts"], vec!["./b", "./z"]);
        assert_eq!(graph.total_edges, 2);
    }

    #[test]
    fn test_tech_stack_keys_group_by_declaring_file() {
        let stack = TechStack {
            language: "TypeScript".to_string(),
            dependencies: vec![DependencyRef {
                name: "react".to_string(),
                version: "^18".to_string(),
                source: "package.json".to_string(),
            }],
            ..Default::default()
        };
        let index = stack.key_index();
        assert!(index["package.json"].contains("dependency:react"));
        assert!(index[REPOSITORY_SCOPE].contains("language:TypeScript"));
    }

    #[test]
    fn test_pattern_report_sorted_and_unique() {
        let finding = |category, text: &str| PatternFinding {
            category,
            description: text.to_string(),
        };
        let report = PatternReport::new(
            1,
            vec![
                finding(PatternCategory::Naming, "b"),
                finding(PatternCategory::ErrorHandling, "a"),
                finding(PatternCategory::Naming, "b"),
            ],
        );
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].category, PatternCategory::ErrorHandling);
        assert_eq!(key_count(&report.key_index()), 2);
    }

    #[test]
    fn test_documented_index_reads_back_region() {
        let registry = SymbolRegistry::from_records(vec![symbol("a.ts", "run", 3)]);
        let region = AutoRegion::from_content(&registry).unwrap();
        let index = documented_index(ManifestKind::Symbols, &region).unwrap();
        assert_eq!(index, registry.key_index());

        assert!(documented_index(ManifestKind::Exports, &region).is_err());
    }
}
