//! Public API surface of the scanned package

use std::collections::BTreeSet;

use cartograph_core::{ApiExport, ApiSurface, ExportEdge};

use crate::deps::PackageJson;
use crate::scanner::SourceFile;

/// Conventional entry modules checked when the package declares none that resolve.
const INDEX_STEMS: &[&str] = &["index", "src/index"];

/// Output directories whose sources usually live under `src/`.
const OUTPUT_DIRS: &[&str] = &["dist", "build", "lib", "out"];

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Suffixes stripped from declared entry paths, longest first.
const ENTRY_SUFFIXES: &[&str] = &[
    ".d.mts", ".d.cts", ".d.ts", ".mts", ".cts", ".tsx", ".ts", ".mjs", ".cjs", ".jsx", ".js",
];

pub fn build_api_surface(
    package: Option<&PackageJson>,
    files: &[SourceFile],
    exports: &[ExportEdge],
) -> ApiSurface {
    let scanned: BTreeSet<&str> = files.iter().map(|f| f.relative.as_str()).collect();

    let mut entry_points = BTreeSet::new();
    let mut resolved = BTreeSet::new();
    for declared in package.map(declared_entries).unwrap_or_default() {
        match resolve_entry(&declared, &scanned) {
            Some(file) => {
                resolved.insert(file.clone());
                entry_points.insert(file);
            }
            None => {
                tracing::debug!("Entry point '{}' does not resolve to a scanned file", declared);
                entry_points.insert(declared);
            }
        }
    }
    if resolved.is_empty() {
        for stem in INDEX_STEMS {
            if let Some(file) = with_source_extension(stem, &scanned) {
                resolved.insert(file.clone());
                entry_points.insert(file);
            }
        }
    }

    let mut public_exports: Vec<ApiExport> = exports
        .iter()
        .filter(|e| resolved.contains(&e.file_path))
        .map(|e| ApiExport {
            file: e.file_path.clone(),
            name: e.exported_name.clone(),
            kind: e.declaration_kind,
        })
        .collect();
    public_exports.sort();
    public_exports.dedup();

    ApiSurface {
        entry_points: entry_points.into_iter().collect(),
        public_exports,
        cli_commands: package.map(cli_commands).unwrap_or_default(),
        scripts: package.map(|p| p.scripts.clone()).unwrap_or_default(),
    }
}

/// Paths named by `main`, `module`, `types`, `typings` and every string in `exports`.
fn declared_entries(package: &PackageJson) -> Vec<String> {
    let mut entries: Vec<String> = [&package.main, &package.module, &package.types, &package.typings]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    if let Some(exports) = &package.exports {
        collect_strings(exports, &mut entries);
    }
    entries
        .into_iter()
        .map(|e| e.trim_start_matches("./").to_string())
        .filter(|e| !e.is_empty() && !e.contains('*'))
        .collect()
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Map a declared entry path onto a scanned source file.
fn resolve_entry(declared: &str, scanned: &BTreeSet<&str>) -> Option<String> {
    if scanned.contains(declared) {
        return Some(declared.to_string());
    }
    let stem = ENTRY_SUFFIXES
        .iter()
        .find_map(|suffix| declared.strip_suffix(suffix))
        .unwrap_or(declared)
        .trim_end_matches('/');

    let mut stems = vec![stem.to_string()];
    if let Some((first, rest)) = stem.split_once('/') {
        if OUTPUT_DIRS.contains(&first) {
            stems.push(format!("src/{}", rest));
        }
    }
    stems.iter().find_map(|stem| {
        with_source_extension(stem, scanned)
            .or_else(|| with_source_extension(&format!("{}/index", stem), scanned))
    })
}

fn with_source_extension(stem: &str, scanned: &BTreeSet<&str>) -> Option<String> {
    SOURCE_EXTENSIONS
        .iter()
        .map(|ext| format!("{}.{}", stem, ext))
        .find(|candidate| scanned.contains(candidate.as_str()))
}

/// Keys of an object `bin`, or the unscoped package name for a string `bin`.
fn cli_commands(package: &PackageJson) -> Vec<String> {
    match &package.bin {
        Some(serde_json::Value::Object(map)) => {
            let mut commands: Vec<String> = map.keys().cloned().collect();
            commands.sort();
            commands
        }
        Some(serde_json::Value::String(_)) => package
            .name
            .as_deref()
            .map(|name| name.rsplit('/').next().unwrap_or(name).to_string())
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}
