//! Persisted manifest documents
//!
//! A document is a single JSON object with three namespaces:
//!
//! * `_metadata`: version and timestamps, rewritten on every write.
//! * the auto-generated region: every other plain key, replaced wholesale on refresh.
//! * the manual region: `notes` and any key starting with `_manual`, never touched by refresh.
//!
//! The namespaces are separate types so that refresh code can only ever produce an
//! [`AutoRegion`], and an [`AutoRegion`] cannot hold a manual or metadata key.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::content::ManifestContent;
use crate::error::ManifestError;

pub const METADATA_KEY: &str = "_metadata";
pub const MANUAL_PREFIX: &str = "_manual";
pub const NOTES_KEY: &str = "notes";

/// Whether `key` belongs to the author-owned namespace.
pub fn is_manual_key(key: &str) -> bool {
    key.starts_with(MANUAL_PREFIX) || key == NOTES_KEY
}

fn is_reserved_key(key: &str) -> bool {
    key.starts_with('_') || key == NOTES_KEY
}

/// The manifest domains maintained for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestKind {
    Symbols,
    Exports,
    Imports,
    TechStack,
    Patterns,
    ApiSurface,
}

impl ManifestKind {
    pub const ALL: [ManifestKind; 6] = [
        ManifestKind::Symbols,
        ManifestKind::Exports,
        ManifestKind::Imports,
        ManifestKind::TechStack,
        ManifestKind::Patterns,
        ManifestKind::ApiSurface,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ManifestKind::Symbols => "symbols",
            ManifestKind::Exports => "exports",
            ManifestKind::Imports => "imports",
            ManifestKind::TechStack => "tech-stack",
            ManifestKind::Patterns => "patterns",
            ManifestKind::ApiSurface => "api-surface",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.slug())
    }

    /// Markdown rendering written next to the JSON document, if this domain has one.
    pub fn markdown_view(&self) -> Option<&'static str> {
        match self {
            ManifestKind::Symbols => Some("symbols.md"),
            ManifestKind::Patterns => Some("patterns.md"),
            _ => None,
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ManifestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ManifestKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = ManifestKind::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown manifest '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub last_updated: DateTime<Utc>,
    /// Starts at 1 and grows by exactly 1 per write.
    pub version: u64,
    pub changes_since_last_update: u64,
    pub auto_generated: bool,
}

/// Content recomputed on every refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoRegion(Map<String, Value>);

impl AutoRegion {
    pub fn from_content<C: ManifestContent>(content: &C) -> Result<Self, ManifestError> {
        Self::from_value(serde_json::to_value(content)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        let Value::Object(map) = value else {
            return Err(ManifestError::Structure(
                "auto-generated content must be a JSON object".to_string(),
            ));
        };
        if let Some(key) = map.keys().find(|key| is_reserved_key(key)) {
            return Err(ManifestError::ReservedKey(key.clone()));
        }
        Ok(AutoRegion(map))
    }

    /// Decode the region back into its typed content.
    pub fn to_content<C: ManifestContent>(&self) -> Result<C, ManifestError> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact, key-sorted JSON used to compare two regions byte for byte.
    pub fn canonical_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Author-supplied content that refreshes carry over untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualRegion(Map<String, Value>);

impl ManualRegion {
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<(), ManifestError> {
        let key = key.into();
        if !is_manual_key(&key) {
            return Err(ManifestError::Structure(format!(
                "'{}' is not a manual key (use '{}' or a '{}' prefix)",
                key, NOTES_KEY, MANUAL_PREFIX
            )));
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub metadata: ManifestMetadata,
    pub auto: AutoRegion,
    pub manual: ManualRegion,
    /// Unrecognised `_`-prefixed keys found while parsing. They are never written back.
    pub ignored_keys: Vec<String>,
}

impl ManifestDocument {
    /// Parse a document from its on-disk JSON text.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Self::from_map(map),
            _ => Err(ManifestError::Structure(
                "top level must be a JSON object".to_string(),
            )),
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self, ManifestError> {
        let metadata = map
            .remove(METADATA_KEY)
            .ok_or_else(|| ManifestError::Structure(format!("missing '{}'", METADATA_KEY)))?;
        let metadata: ManifestMetadata = serde_json::from_value(metadata)?;

        let mut auto = Map::new();
        let mut manual = Map::new();
        let mut ignored_keys = Vec::new();
        for (key, value) in map {
            if is_manual_key(&key) {
                manual.insert(key, value);
            } else if is_reserved_key(&key) {
                tracing::warn!("Ignoring unrecognised reserved key '{}' in manifest", key);
                ignored_keys.push(key);
            } else {
                auto.insert(key, value);
            }
        }

        Ok(ManifestDocument {
            metadata,
            auto: AutoRegion(auto),
            manual: ManualRegion(manual),
            ignored_keys,
        })
    }

    /// Pretty JSON with `_metadata` first, then the auto region, then the manual region.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

impl Serialize for ManifestDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.auto.len() + self.manual.len()))?;
        map.serialize_entry(METADATA_KEY, &self.metadata)?;
        for (key, value) in self.auto.iter() {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in self.manual.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ManifestDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        ManifestDocument::from_map(map).map_err(D::Error::custom)
    }
}

/// What the manifest directory held for one domain before this run.
#[derive(Debug, Clone)]
pub enum PriorManifest {
    Missing,
    Loaded(ManifestDocument),
    /// Present on disk but unreadable as a manifest. `raw` holds whatever bytes were readable.
    Corrupt { reason: String, raw: Vec<u8> },
}

impl PriorManifest {
    pub fn document(&self) -> Option<&ManifestDocument> {
        match self {
            PriorManifest::Loaded(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, PriorManifest::Missing)
    }
}
