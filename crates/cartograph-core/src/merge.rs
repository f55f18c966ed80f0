//! Reconcile freshly computed content with a previously persisted manifest

use chrono::{DateTime, Utc};

use crate::content::KeyIndex;
use crate::manifest::{AutoRegion, ManifestDocument, ManifestKind, ManifestMetadata, ManualRegion, PriorManifest};

/// The next version of one manifest, plus what the merge had to recover from.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: ManifestDocument,
    /// Set when the prior document was unreadable and has been rebuilt from scratch.
    pub recovered_from: Option<String>,
    /// Auto-region keys of the prior document that the fresh content no longer produces.
    pub dropped_keys: Vec<String>,
}

/// Produce the next document version.
///
/// The auto region is replaced by `fresh`; the manual region of a readable prior
/// document is carried over verbatim. A corrupt prior document counts as absent.
pub fn merge(
    kind: ManifestKind,
    prior: &PriorManifest,
    fresh: AutoRegion,
    changes: u64,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let (version, manual, dropped_keys, recovered_from) = match prior {
        PriorManifest::Missing => (1, ManualRegion::default(), Vec::new(), None),
        PriorManifest::Corrupt { reason, .. } => {
            tracing::warn!(
                "Manifest '{}' is unreadable ({}); rebuilding it from scratch",
                kind,
                reason
            );
            (1, ManualRegion::default(), Vec::new(), Some(reason.clone()))
        }
        PriorManifest::Loaded(existing) => {
            let dropped: Vec<String> = existing
                .auto
                .keys()
                .filter(|key| fresh.get(key).is_none())
                .cloned()
                .collect();
            for key in &dropped {
                tracing::warn!(
                    "Key '{}' in the auto-generated part of '{}' is not produced by refresh and will be dropped; move hand-written content under '_manual'",
                    key,
                    kind
                );
            }
            (
                existing.metadata.version + 1,
                existing.manual.clone(),
                dropped,
                None,
            )
        }
    };

    let document = ManifestDocument {
        metadata: ManifestMetadata {
            last_updated: now,
            version,
            changes_since_last_update: changes,
            auto_generated: true,
        },
        auto: fresh,
        manual,
        ignored_keys: Vec::new(),
    };

    MergeOutcome {
        document,
        recovered_from,
        dropped_keys,
    }
}

/// Number of keys present in exactly one of the two indexes.
///
/// Used as the change count when version-control history cannot provide one.
pub fn key_delta(previous: &KeyIndex, fresh: &KeyIndex) -> u64 {
    let flatten = |index: &KeyIndex| -> std::collections::BTreeSet<(String, String)> {
        index
            .iter()
            .flat_map(|(file, keys)| keys.iter().map(move |k| (file.clone(), k.clone())))
            .collect()
    };
    let previous = flatten(previous);
    let fresh = flatten(fresh);
    previous.symmetric_difference(&fresh).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-03-01T00:00:00Z".parse().unwrap()
    }

    fn loaded(version: u64, auto: serde_json::Value, manual: &[(&str, serde_json::Value)]) -> PriorManifest {
        let mut region = ManualRegion::default();
        for (key, value) in manual {
            region.insert(*key, value.clone()).unwrap();
        }
        PriorManifest::Loaded(ManifestDocument {
            metadata: ManifestMetadata {
                last_updated: "2026-02-01T00:00:00Z".parse().unwrap(),
                version,
                changes_since_last_update: 0,
                auto_generated: true,
            },
            auto: AutoRegion::from_value(auto).unwrap(),
            manual: region,
            ignored_keys: Vec::new(),
        })
    }

    #[test]
    fn test_first_write_is_version_one() {
        let fresh = AutoRegion::from_value(json!({ "files": {} })).unwrap();
        let outcome = merge(ManifestKind::Symbols, &PriorManifest::Missing, fresh, 0, now());
        assert_eq!(outcome.document.metadata.version, 1);
        assert_eq!(outcome.document.metadata.last_updated, now());
        assert!(outcome.document.metadata.auto_generated);
        assert!(outcome.document.manual.is_empty());
    }

    #[test]
    fn test_manual_region_and_notes_survive() {
        let prior = loaded(
            4,
            json!({ "files": { "old.ts": [] } }),
            &[("_manual", json!({ "note": "x" })), ("notes", json!("keep"))],
        );
        let fresh = AutoRegion::from_value(json!({ "files": { "new.ts": [] } })).unwrap();

        let outcome = merge(ManifestKind::Symbols, &prior, fresh.clone(), 3, now());
        let doc = outcome.document;
        assert_eq!(doc.metadata.version, 5);
        assert_eq!(doc.metadata.changes_since_last_update, 3);
        assert_eq!(doc.auto, fresh);
        assert_eq!(doc.manual.get("_manual"), Some(&json!({ "note": "x" })));
        assert_eq!(doc.manual.get("notes"), Some(&json!("keep")));
    }

    #[test]
    fn test_repeated_merges_keep_manual_and_count_versions() {
        let mut prior = loaded(1, json!({}), &[("_manual", json!({ "note": "x" }))]);
        for _ in 0..5 {
            let fresh = AutoRegion::from_value(json!({ "files": {} })).unwrap();
            let outcome = merge(ManifestKind::Exports, &prior, fresh, 0, now());
            prior = PriorManifest::Loaded(outcome.document);
        }
        let doc = prior.document().unwrap();
        assert_eq!(doc.metadata.version, 6);
        assert_eq!(doc.manual.get("_manual"), Some(&json!({ "note": "x" })));
    }

    #[test]
    fn test_corrupt_prior_is_rebuilt() {
        let prior = PriorManifest::Corrupt {
            reason: "expected value at line 1".to_string(),
            raw: b"{oops".to_vec(),
        };
        let fresh = AutoRegion::from_value(json!({ "files": {} })).unwrap();
        let outcome = merge(ManifestKind::Imports, &prior, fresh, 0, now());
        assert_eq!(outcome.document.metadata.version, 1);
        assert!(outcome.recovered_from.is_some());
    }

    #[test]
    fn test_hand_edited_auto_keys_are_reported() {
        let prior = loaded(2, json!({ "files": {}, "myExtra": true }), &[]);
        let fresh = AutoRegion::from_value(json!({ "files": {} })).unwrap();
        let outcome = merge(ManifestKind::Symbols, &prior, fresh, 0, now());
        assert_eq!(outcome.dropped_keys, vec!["myExtra".to_string()]);
        assert!(outcome.document.auto.get("myExtra").is_none());
    }

    #[test]
    fn test_key_delta_counts_symmetric_difference() {
        let a = KeyIndex::from([("a.ts".to_string(), ["x", "y"].map(String::from).into())]);
        let b = KeyIndex::from([("a.ts".to_string(), ["y", "z"].map(String::from).into())]);
        assert_eq!(key_delta(&a, &b), 2);
        assert_eq!(key_delta(&a, &a), 0);
    }
}
