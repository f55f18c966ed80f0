//! Indexer tests over a complete sample project

use cartograph_core::test_utils::{create_repo_with_structure, create_sample_project};
use cartograph_core::{
    Config, ExportKind, ManifestKind, PatternCategory, ScanContext, SymbolKind, key_count,
};

use crate::coordinator::{Coordinator, RepositoryIndex};
use crate::scanner::scan;

fn index(root: &std::path::Path) -> RepositoryIndex {
    let ctx = ScanContext::new(root, &Config::default()).unwrap();
    let scanned = scan(&ctx);
    let batch = Coordinator::new(&ctx).extract_all(&scanned.files);
    RepositoryIndex::assemble(ctx.root(), &scanned.files, scanned.issues, batch)
}

#[test]
fn test_sample_project_index() {
    let dir = create_sample_project();
    let index = index(dir.path());

    assert_eq!(
        index.files,
        vec!["src/index.ts", "src/services/user.ts", "src/utils/format.ts"]
    );
    assert!(index.extraction_errors.is_empty());
    assert!(index.manifest_issues.is_empty());

    let user_file = &index.symbols.files["src/services/user.ts"];
    let names: Vec<_> = user_file.iter().map(|s| s.qualified_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["User", "UserService", "UserService.loadUsers", "UserService.displayName"]
    );
    let load = &user_file[2];
    assert_eq!(load.kind, SymbolKind::Method);
    assert!(load.is_async);
    assert!(load.is_exported);
    assert_eq!(load.return_type_text.as_deref(), Some("Promise<User[]>"));

    let slugify = index.symbols.files["src/utils/format.ts"]
        .iter()
        .find(|s| s.name == "slugify")
        .unwrap();
    assert_eq!(slugify.kind, SymbolKind::VariableFunction);
    assert_eq!(slugify.parameters[0].type_text.as_deref(), Some("string"));
}

#[test]
fn test_sample_project_graphs() {
    let dir = create_sample_project();
    let index = index(dir.path());

    assert_eq!(
        index.imports.files["src/services/user.ts"],
        vec!["../utils/format"],
        "bare package imports are external"
    );
    assert_eq!(
        index.imports.files["src/index.ts"],
        vec!["./services/user", "./utils/format"]
    );

    let entry_exports = &index.exports.files["src/index.ts"];
    assert!(
        entry_exports
            .iter()
            .any(|e| e.name == "UserService" && e.kind == ExportKind::ReExport)
    );
    assert!(
        entry_exports
            .iter()
            .any(|e| e.name == "main" && e.kind == ExportKind::Function)
    );

    assert_eq!(index.api_surface.entry_points, vec!["src/index.ts"]);
    assert_eq!(index.api_surface.cli_commands, vec!["sample"]);
    assert!(index.api_surface.public_exports.iter().all(|e| e.file == "src/index.ts"));
}

#[test]
fn test_sample_project_conventions() {
    let dir = create_sample_project();
    let index = index(dir.path());

    assert_eq!(index.tech_stack.language, "TypeScript");
    assert_eq!(index.tech_stack.testing_framework.as_deref(), Some("vitest"));
    assert_eq!(index.tech_stack.package_manager.as_deref(), Some("npm"));

    let has = |category: PatternCategory, description: &str| {
        index
            .patterns
            .findings
            .iter()
            .any(|f| f.category == category && f.description == description)
    };
    assert!(has(PatternCategory::ErrorHandling, "try/catch blocks around fallible operations"));
    assert!(has(PatternCategory::DataFlow, "async/await for asynchronous control flow"));
    assert!(has(PatternCategory::DataFlow, "HTTP requests via fetch or axios"));
    assert!(has(PatternCategory::Naming, "camelCase function and method names"));
    assert!(has(PatternCategory::Naming, "Interfaces named without an I prefix"));
    assert!(!index.patterns.findings.iter().any(|f| f.description.contains("Custom Error")));
}

#[test]
fn test_index_is_deterministic() {
    let dir = create_sample_project();
    let first = index(dir.path());
    let second = index(dir.path());
    for kind in ManifestKind::ALL {
        assert_eq!(
            first.auto_region(kind).unwrap().canonical_json(),
            second.auto_region(kind).unwrap().canonical_json(),
            "{kind} differs between runs"
        );
    }
}

#[test]
fn test_single_async_export() {
    let dir = create_repo_with_structure(&[("foo.ts", "export async function foo() {}\n")]);
    let index = index(dir.path());
    assert_eq!(index.symbols.total_symbols, 1);
    let foo = &index.symbols.files["foo.ts"][0];
    assert_eq!(foo.name, "foo");
    assert!(foo.is_async);
    assert!(foo.is_exported);
    assert_eq!(key_count(&index.key_index(ManifestKind::Symbols)), 1);
}
