//! Dependency manifest reading and tech-stack assembly
//!
//! Reads `package.json` and `Cargo.toml` at the scan root. A manifest that
//! exists but cannot be parsed is reported and otherwise ignored.

use std::collections::BTreeMap;
use std::path::Path;

use cartograph_core::{DependencyRef, TechStack};
use serde::Deserialize;

use crate::heuristics::{ToolRole, classify_dependencies};
use crate::parser_pool::FileType;
use crate::scanner::SourceFile;

pub const PACKAGE_JSON: &str = "package.json";
pub const CARGO_TOML: &str = "Cargo.toml";

/// Lockfiles in detection order, with the package manager they imply.
const LOCKFILES: &[(&str, &str)] = &[
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bun"),
    ("bun.lock", "bun"),
    ("package-lock.json", "npm"),
    ("npm-shrinkwrap.json", "npm"),
];

/// The parts of `package.json` cartograph reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageJson {
    pub name: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub types: Option<String>,
    pub typings: Option<String>,
    pub exports: Option<serde_json::Value>,
    pub bin: Option<serde_json::Value>,
    pub scripts: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, serde_json::Value>,
    pub dev_dependencies: BTreeMap<String, serde_json::Value>,
    pub peer_dependencies: BTreeMap<String, serde_json::Value>,
    pub package_manager: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReadIssue {
    pub path: String,
    pub reason: String,
}

/// Project manifests found at the root.
#[derive(Debug, Clone, Default)]
pub struct ProjectManifests {
    pub package_json: Option<PackageJson>,
    pub dependencies: Vec<DependencyRef>,
    pub dev_dependencies: Vec<DependencyRef>,
    pub lockfiles: Vec<&'static str>,
    pub has_cargo: bool,
    pub issues: Vec<ManifestReadIssue>,
}

impl ProjectManifests {
    /// Names of every declared dependency, runtime and dev.
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .chain(&self.dev_dependencies)
            .map(|d| d.name.as_str())
            .collect()
    }
}

pub fn read_manifests(root: &Path) -> ProjectManifests {
    let mut manifests = ProjectManifests::default();

    match std::fs::read_to_string(root.join(PACKAGE_JSON)) {
        Ok(content) => match serde_json::from_str::<PackageJson>(&content) {
            Ok(package) => {
                manifests
                    .dependencies
                    .extend(npm_dependencies(&package.dependencies));
                manifests
                    .dependencies
                    .extend(npm_dependencies(&package.peer_dependencies));
                manifests
                    .dev_dependencies
                    .extend(npm_dependencies(&package.dev_dependencies));
                manifests.package_json = Some(package);
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", PACKAGE_JSON, e);
                manifests.issues.push(ManifestReadIssue {
                    path: PACKAGE_JSON.to_string(),
                    reason: e.to_string(),
                });
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => manifests.issues.push(ManifestReadIssue {
            path: PACKAGE_JSON.to_string(),
            reason: e.to_string(),
        }),
    }

    match std::fs::read_to_string(root.join(CARGO_TOML)) {
        Ok(content) => match content.parse::<toml::Table>() {
            Ok(table) => {
                manifests.has_cargo = true;
                manifests
                    .dependencies
                    .extend(cargo_dependencies(&table, "dependencies"));
                manifests
                    .dependencies
                    .extend(cargo_dependencies(&table, "build-dependencies"));
                manifests
                    .dev_dependencies
                    .extend(cargo_dependencies(&table, "dev-dependencies"));
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", CARGO_TOML, e);
                manifests.issues.push(ManifestReadIssue {
                    path: CARGO_TOML.to_string(),
                    reason: e.to_string(),
                });
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => manifests.issues.push(ManifestReadIssue {
            path: CARGO_TOML.to_string(),
            reason: e.to_string(),
        }),
    }

    manifests.lockfiles = LOCKFILES
        .iter()
        .map(|(file, _)| *file)
        .filter(|file| root.join(file).is_file())
        .collect();

    manifests.dependencies.sort();
    manifests.dependencies.dedup();
    manifests.dev_dependencies.sort();
    manifests.dev_dependencies.dedup();
    manifests
}

fn npm_dependencies(
    declared: &BTreeMap<String, serde_json::Value>,
) -> impl Iterator<Item = DependencyRef> + '_ {
    declared.iter().map(|(name, version)| DependencyRef {
        name: name.clone(),
        version: version.as_str().unwrap_or("").to_string(),
        source: PACKAGE_JSON.to_string(),
    })
}

fn cargo_dependencies<'a>(
    table: &'a toml::Table,
    section: &str,
) -> impl Iterator<Item = DependencyRef> + 'a {
    table
        .get(section)
        .and_then(|v| v.as_table())
        .into_iter()
        .flatten()
        .map(|(name, value)| DependencyRef {
            name: name.clone(),
            version: cargo_version(value),
            source: CARGO_TOML.to_string(),
        })
}

/// Handles both `"1.0"` and `{ version = "1.0", … }` forms.
fn cargo_version(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) => t
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        _ => String::new(),
    }
}

/// `packageManager` field first, then lockfiles, then the manifests present.
pub fn detect_package_manager(manifests: &ProjectManifests) -> Option<String> {
    let declared = manifests
        .package_json
        .as_ref()
        .and_then(|p| p.package_manager.as_deref())
        .and_then(|field| field.split('@').next())
        .filter(|name| !name.is_empty());
    if let Some(name) = declared {
        return Some(name.to_string());
    }
    if let Some(first) = manifests.lockfiles.first() {
        return LOCKFILES
            .iter()
            .find(|(file, _)| file == first)
            .map(|(_, manager)| manager.to_string());
    }
    if manifests.package_json.is_some() {
        return Some("npm".to_string());
    }
    manifests.has_cargo.then(|| "cargo".to_string())
}

fn detect_language(manifests: &ProjectManifests, files: &[SourceFile]) -> &'static str {
    let mut typescript = 0usize;
    let mut javascript = 0usize;
    for file in files {
        match FileType::from_path(Path::new(&file.relative)) {
            Some(t) if t.is_typescript() => typescript += 1,
            Some(_) => javascript += 1,
            None => {}
        }
    }
    let declares_typescript = manifests.dependency_names().contains(&"typescript");
    if typescript > 0 && (typescript >= javascript || declares_typescript) {
        "TypeScript"
    } else if javascript > 0 || manifests.package_json.is_some() {
        "JavaScript"
    } else if manifests.has_cargo {
        "Rust"
    } else {
        "Unknown"
    }
}

/// Summarise language, package manager and tooling.
pub fn build_tech_stack(manifests: &ProjectManifests, files: &[SourceFile]) -> TechStack {
    let roles = classify_dependencies(manifests.dependency_names());
    let first = |role: ToolRole| {
        roles
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, label)| label.to_string())
    };
    let all = |role: ToolRole| -> Vec<String> {
        roles
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, label)| label.to_string())
            .collect()
    };

    TechStack {
        language: detect_language(manifests, files).to_string(),
        package_manager: detect_package_manager(manifests),
        dependencies: manifests.dependencies.clone(),
        dev_dependencies: manifests.dev_dependencies.clone(),
        testing_framework: first(ToolRole::TestFramework),
        bundler: first(ToolRole::Bundler),
        linter: first(ToolRole::Linter),
        formatter: first(ToolRole::Formatter),
        frameworks: all(ToolRole::Framework),
        build_tools: all(ToolRole::BuildTool),
    }
}
