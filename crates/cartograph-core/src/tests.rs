//! Cross-module tests for cartograph-core

use crate::test_utils::create_repo_with_structure;
use crate::*;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

fn symbol(file: &str, name: &str, line: u32) -> SymbolRecord {
    SymbolRecord {
        name: name.to_string(),
        qualified_name: name.to_string(),
        kind: SymbolKind::Function,
        file_path: file.to_string(),
        start_line: line,
        signature_text: format!("function {}()", name),
        is_async: false,
        is_exported: true,
        parameters: vec![],
        return_type_text: None,
    }
}

fn base_time() -> DateTime<Utc> {
    "2026-06-01T09:00:00Z".parse().unwrap()
}

/// Merge `registry` over whatever the store holds and write it back.
fn refresh(store: &ManifestStore, registry: &SymbolRegistry, now: DateTime<Utc>) -> ManifestDocument {
    let prior = store.load(ManifestKind::Symbols);
    let fresh = AutoRegion::from_content(registry).unwrap();
    let outcome = merge(ManifestKind::Symbols, &prior, fresh, 0, now);
    let markdown = render_markdown(ManifestKind::Symbols, &outcome.document).unwrap();
    let backup = match &prior {
        PriorManifest::Corrupt { raw, .. } => Some(raw.as_slice()),
        _ => None,
    };
    let staged = store
        .stage(ManifestKind::Symbols, &outcome.document, markdown.as_deref(), backup)
        .unwrap();
    store.commit(vec![staged]).unwrap();
    outcome.document
}

#[test]
fn test_refresh_cycle_preserves_manual_region_on_disk() {
    let repo = create_repo_with_structure(&[]);
    let store = ManifestStore::new(repo.path().join(".cartograph"));
    store.ensure_dir().unwrap();
    let registry = SymbolRegistry::from_records(vec![symbol("a.ts", "a", 1)]);

    refresh(&store, &registry, base_time());

    // An author adds hand-written content between runs.
    let path = store.path_for(ManifestKind::Symbols);
    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    raw["_manual"] = json!({ "note": "x" });
    raw["notes"] = json!("keep");
    std::fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

    let mut last = None;
    for i in 1..=4 {
        last = Some(refresh(&store, &registry, base_time() + Duration::hours(i)));
    }
    let doc = last.unwrap();
    assert_eq!(doc.metadata.version, 5);
    assert_eq!(doc.manual.get("_manual"), Some(&json!({ "note": "x" })));
    assert_eq!(doc.manual.get("notes"), Some(&json!("keep")));

    let reloaded = store.load(ManifestKind::Symbols);
    assert_eq!(reloaded.document(), Some(&doc));
}

#[test]
fn test_unchanged_content_is_byte_identical_apart_from_metadata() {
    let repo = create_repo_with_structure(&[]);
    let store = ManifestStore::new(repo.path());
    let registry =
        SymbolRegistry::from_records(vec![symbol("b.ts", "b", 4), symbol("a.ts", "a", 2)]);

    let first = refresh(&store, &registry, base_time());
    let second = refresh(&store, &registry, base_time() + Duration::minutes(5));

    assert_eq!(first.auto.canonical_json(), second.auto.canonical_json());
    assert_eq!(second.metadata.version, first.metadata.version + 1);
    assert_ne!(first.metadata.last_updated, second.metadata.last_updated);
}

#[test]
fn test_corrupt_document_is_rebuilt_and_kept_as_backup() {
    let repo = create_repo_with_structure(&[(".cartograph/symbols.json", "{\"_metadata\": 42")]);
    let store = ManifestStore::new(repo.path().join(".cartograph"));

    let doc = refresh(&store, &SymbolRegistry::default(), base_time());

    assert_eq!(doc.metadata.version, 1);
    assert!(store.load(ManifestKind::Symbols).document().is_some());
    let backup = std::fs::read_to_string(store.corrupt_backup_path(ManifestKind::Symbols)).unwrap();
    assert_eq!(backup, "{\"_metadata\": 42");
}

#[test]
fn test_coverage_of_persisted_manifest() {
    let documented = SymbolRegistry::from_records(vec![symbol("a.ts", "a", 1)]);
    let scanned = SymbolRegistry::from_records(vec![symbol("a.ts", "a", 1), symbol("b.ts", "b", 1)]);

    let coverage = Coverage::between(&scanned.key_index(), &documented.key_index());
    assert_eq!(coverage.percent, 50);

    let empty = Coverage::between(&KeyIndex::new(), &documented.key_index());
    assert_eq!(empty.percent, 0);
}

#[test]
fn test_typed_content_survives_document_roundtrip() {
    let registry = SymbolRegistry::from_records(vec![symbol("a.ts", "a", 1)]);
    let doc = ManifestDocument {
        metadata: ManifestMetadata {
            last_updated: base_time(),
            version: 1,
            changes_since_last_update: 0,
            auto_generated: true,
        },
        auto: AutoRegion::from_content(&registry).unwrap(),
        manual: ManualRegion::default(),
        ignored_keys: Vec::new(),
    };
    let parsed = ManifestDocument::parse(&doc.to_json_pretty().unwrap()).unwrap();
    let decoded: SymbolRegistry = parsed.auto.to_content().unwrap();
    assert_eq!(decoded, registry);
}
