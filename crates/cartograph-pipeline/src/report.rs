//! Results of status, refresh and create runs

use std::fmt;
use std::path::PathBuf;

use cartograph_core::{Coverage, ManifestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Scan,
    Extraction,
    DependencyManifest,
    CorruptManifest,
    DroppedKeys,
    IgnoredKeys,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::Scan => "scan",
            IssueKind::Extraction => "parse",
            IssueKind::DependencyManifest => "dependencies",
            IssueKind::CorruptManifest => "manifest",
            IssueKind::DroppedKeys => "dropped",
            IssueKind::IgnoredKeys => "ignored",
        }
    }
}

/// A recoverable problem met during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Issue {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.label(), self.subject, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    MissingItems(usize),
    OrphanedItems(usize),
    Age { days: i64 },
    Unreadable(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingItems(n) => write!(f, "{} missing items", n),
            StaleReason::OrphanedItems(n) => write!(f, "{} orphaned items", n),
            StaleReason::Age { days } => write!(f, "{} days old", days),
            StaleReason::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestState {
    Current,
    Stale(Vec<StaleReason>),
    Missing,
}

impl fmt::Display for ManifestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestState::Current => write!(f, "CURRENT"),
            ManifestState::Missing => write!(f, "MISSING"),
            ManifestState::Stale(reasons) => {
                let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                write!(f, "STALE({})", reasons.join(", "))
            }
        }
    }
}

/// Read-only view of one manifest against the current tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestAssessment {
    pub kind: ManifestKind,
    pub state: ManifestState,
    pub coverage: Coverage,
    pub version: Option<u64>,
    pub days_since_update: Option<i64>,
    /// Paths added or modified since the last update.
    pub added_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub deleted_files: Vec<String>,
    /// Touched files whose items the manifest does not contain.
    pub missing_items: Vec<String>,
    /// Deleted files the manifest still describes.
    pub orphaned_items: Vec<String>,
}

impl ManifestAssessment {
    pub fn is_stale(&self) -> bool {
        matches!(self.state, ManifestState::Stale(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub manifests: Vec<ManifestAssessment>,
    pub history_available: bool,
    pub issues: Vec<Issue>,
}

impl StatusReport {
    pub fn any_missing(&self) -> bool {
        self.manifests
            .iter()
            .any(|m| m.state == ManifestState::Missing)
    }

    pub fn any_stale(&self) -> bool {
        self.manifests.iter().any(ManifestAssessment::is_stale)
    }

    /// `2` when a manifest is missing, `1` when stale under `strict`, else `0`.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.any_missing() {
            2
        } else if strict && self.any_stale() {
            1
        } else {
            0
        }
    }
}

/// One manifest written by a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestUpdate {
    pub kind: ManifestKind,
    pub version: u64,
    pub changes: u64,
    pub coverage: Coverage,
    pub path: PathBuf,
    pub created: bool,
    pub rebuilt: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub updated: Vec<ManifestUpdate>,
    /// Manifests left untouched, e.g. existing ones during `create`.
    pub skipped: Vec<ManifestKind>,
    pub files_scanned: usize,
    pub symbols: usize,
    pub issues: Vec<Issue>,
}
