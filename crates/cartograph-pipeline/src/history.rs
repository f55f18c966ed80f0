//! Change detection from version-control history
//!
//! The log is read once per run with a single `git log` call covering the
//! oldest manifest. Each manifest then folds only the commits newer than its
//! own `lastUpdated`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::HistoryError;

const RECORD_SEPARATOR: char = '\u{1e}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

impl ChangeStatus {
    fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(ChangeStatus::Added),
            'M' | 'T' | 'R' => Some(ChangeStatus::Modified),
            'D' => Some(ChangeStatus::Deleted),
            _ => None,
        }
    }

    /// Net status after `next` follows `self`. `None` means the path never existed
    /// outside the window.
    fn then(self, next: ChangeStatus) -> Option<ChangeStatus> {
        use ChangeStatus::*;
        match (self, next) {
            (Added, Deleted) => None,
            (Added, _) => Some(Added),
            (Deleted, Added | Modified) => Some(Modified),
            (_, Deleted) => Some(Deleted),
            (Modified, _) => Some(Modified),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<(ChangeStatus, String)>,
}

/// Commits oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    pub commits: Vec<Commit>,
}

impl ChangeLog {
    /// Parse `git log -z --reverse --name-status --pretty=format:%x1e%ct` output.
    ///
    /// Each record is a timestamp line followed by NUL-separated status and path
    /// fields. Paths are taken verbatim, so names with spaces or non-ASCII
    /// characters match the scanned relative paths.
    pub fn parse(output: &str) -> Result<Self, HistoryError> {
        let mut commits = Vec::new();
        for record in output.split(RECORD_SEPARATOR) {
            let record = record.trim_start_matches(['\n', '\0']);
            if record.is_empty() {
                continue;
            }
            let (header, body) = record.split_once(['\n', '\0']).unwrap_or((record, ""));
            let seconds: i64 = header
                .trim()
                .parse()
                .map_err(|_| HistoryError::Parse(format!("bad commit timestamp '{}'", header)))?;
            let timestamp = Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or_else(|| HistoryError::Parse(format!("timestamp out of range: {}", seconds)))?;

            let mut changes = Vec::new();
            let mut fields = body.split('\0');
            while let Some(code) = fields.next() {
                let code = code.trim_matches('\n');
                if code.is_empty() {
                    continue;
                }
                let Some(path) = fields.next() else {
                    return Err(HistoryError::Parse(format!("status '{}' without a path", code)));
                };
                if let Some(status) = ChangeStatus::from_code(code) {
                    changes.push((status, path.to_string()));
                }
            }
            commits.push(Commit { timestamp, changes });
        }
        Ok(ChangeLog { commits })
    }

    /// Net changes of commits strictly newer than `after`, to the second.
    pub fn since(&self, after: DateTime<Utc>) -> ChangeSet {
        let cutoff = after.timestamp();
        let mut net: BTreeMap<String, Option<ChangeStatus>> = BTreeMap::new();
        for commit in self.commits.iter().filter(|c| c.timestamp.timestamp() > cutoff) {
            for (status, path) in &commit.changes {
                let next = match net.get(path) {
                    Some(Some(previous)) => previous.then(*status),
                    // Added then deleted earlier in the window; appearing again is an add.
                    Some(None) => Some(ChangeStatus::Added),
                    None => Some(*status),
                };
                net.insert(path.clone(), next);
            }
        }
        ChangeSet {
            paths: net
                .into_iter()
                .filter_map(|(path, status)| Some((path, status?)))
                .collect(),
        }
    }
}

/// Net status of each path touched in a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: BTreeMap<String, ChangeStatus>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn with_status(&self, status: ChangeStatus) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(move |(_, s)| **s == status)
            .map(|(path, _)| path.as_str())
    }

    /// Paths that exist now and changed in the window.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|(_, s)| **s != ChangeStatus::Deleted)
            .map(|(path, _)| path.as_str())
    }

    /// Keep only paths accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.paths.retain(|path, _| keep(path));
    }
}

/// Source of commit history for the scanned tree.
pub trait VersionControl: Send + Sync {
    /// Commits since `since`, with paths relative to the scan root.
    fn log_since(&self, since: DateTime<Utc>) -> Result<ChangeLog, HistoryError>;
}

/// History read from the `git` executable.
pub struct GitHistory {
    root: PathBuf,
}

impl GitHistory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GitHistory { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VersionControl for GitHistory {
    fn log_since(&self, since: DateTime<Utc>) -> Result<ChangeLog, HistoryError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["-c", "core.quotePath=false"])
            .args([
                "log",
                "-z",
                "--reverse",
                "--name-status",
                "--no-renames",
                "--relative",
                "--pretty=format:%x1e%ct",
            ])
            .arg(format!("--since={}", since.format("%Y-%m-%d %H:%M:%S +0000")))
            .args(["--", "."])
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HistoryError::Failed(stderr.trim().to_string()));
        }
        ChangeLog::parse(&String::from_utf8_lossy(&output.stdout))
    }
}
