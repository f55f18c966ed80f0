//! Sequences scan, extraction, change detection, merge and persistence
//!
//! One [`Orchestrator`] drives one invocation through
//! `Idle → Scanning → Extracting → DetectingChanges → Merging → Persisted`.
//! Only a failure to write the manifest directory ends in `Failed`; per-file
//! and per-manifest problems are collected as [`Issue`]s.

use std::fmt;

use cartograph_core::{
    Coverage, KeyIndex, ManifestKind, ManifestStore, PriorManifest, ScanContext,
    documented_index, key_count, key_delta, merge, render_markdown,
};
use cartograph_indexer::deps::{CARGO_TOML, PACKAGE_JSON};
use cartograph_indexer::{Coordinator, RepositoryIndex, scan};
use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::history::{ChangeLog, ChangeSet, ChangeStatus, GitHistory, VersionControl};
use crate::report::{
    Issue, IssueKind, ManifestAssessment, ManifestState, ManifestUpdate, RefreshReport,
    StaleReason, StatusReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Extracting,
    DetectingChanges,
    Merging,
    Persisted,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Scanning => "scanning",
            Phase::Extracting => "extracting",
            Phase::DetectingChanges => "detecting changes",
            Phase::Merging => "merging",
            Phase::Persisted => "persisted",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Analysis {
    index: RepositoryIndex,
    log: Option<ChangeLog>,
}

pub struct Orchestrator<'a> {
    ctx: &'a ScanContext,
    store: ManifestStore,
    history: Box<dyn VersionControl + 'a>,
    clock: Box<dyn Clock + 'a>,
    phase: Phase,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator over `ctx` using `git` history and the system clock.
    pub fn new(ctx: &'a ScanContext) -> Self {
        Orchestrator {
            ctx,
            store: ManifestStore::new(ctx.manifest_dir()),
            history: Box::new(GitHistory::new(ctx.root())),
            clock: Box::new(SystemClock),
            phase: Phase::Idle,
        }
    }

    pub fn with_history(mut self, history: impl VersionControl + 'a) -> Self {
        self.history = Box::new(history);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Rebuild the auto region of every manifest in `kinds` and write them all.
    pub fn refresh(&mut self, kinds: &[ManifestKind]) -> Result<RefreshReport, PipelineError> {
        self.write(kinds, false)
    }

    /// Write manifests that do not exist yet. Existing ones, readable or not, are left alone.
    pub fn create(&mut self) -> Result<RefreshReport, PipelineError> {
        self.write(&ManifestKind::ALL, true)
    }

    /// Assess every manifest against the current tree without writing anything.
    pub fn status(&mut self) -> StatusReport {
        let priors = self.load_priors(&ManifestKind::ALL);
        let analysis = self.analyze(&priors);
        let now = self.clock.now();

        let mut issues = index_issues(&analysis.index);
        let manifests = priors
            .iter()
            .map(|(kind, prior)| {
                if let PriorManifest::Corrupt { reason, .. } = prior {
                    issues.push(Issue::new(
                        IssueKind::CorruptManifest,
                        self.store.path_for(*kind).display().to_string(),
                        reason.clone(),
                    ));
                }
                issues.extend(ignored_keys_issue(*kind, prior));
                self.assess(*kind, prior, &analysis, now)
            })
            .collect();

        self.enter(Phase::Idle);
        StatusReport {
            manifests,
            history_available: analysis.log.is_some(),
            issues,
        }
    }

    fn write(
        &mut self,
        kinds: &[ManifestKind],
        only_missing: bool,
    ) -> Result<RefreshReport, PipelineError> {
        let (targets, skipped): (Vec<_>, Vec<_>) = self
            .load_priors(kinds)
            .into_iter()
            .partition(|(_, prior)| !only_missing || !prior.exists());

        let mut report = RefreshReport {
            skipped: skipped.into_iter().map(|(kind, _)| kind).collect(),
            ..Default::default()
        };
        if targets.is_empty() {
            tracing::info!("All manifests already exist; nothing to create");
            self.enter(Phase::Persisted);
            return Ok(report);
        }

        let analysis = self.analyze(&targets);
        report.files_scanned = analysis.index.files.len();
        report.symbols = analysis.index.symbols.total_symbols;
        report.issues = index_issues(&analysis.index);

        let result = self.persist(&targets, &analysis, &mut report);
        match result {
            Ok(()) => {
                self.enter(Phase::Persisted);
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Refresh failed: {}", e);
                self.enter(Phase::Failed);
                Err(e)
            }
        }
    }

    fn persist(
        &mut self,
        targets: &[(ManifestKind, PriorManifest)],
        analysis: &Analysis,
        report: &mut RefreshReport,
    ) -> Result<(), PipelineError> {
        self.enter(Phase::Merging);
        let now = self.clock.now();
        self.store
            .ensure_dir()
            .map_err(|source| PipelineError::ManifestDir {
                path: self.store.dir().to_path_buf(),
                source,
            })?;

        let mut staged = Vec::with_capacity(targets.len());
        let mut updates = Vec::with_capacity(targets.len());
        for (kind, prior) in targets {
            let kind = *kind;
            let known = analysis.index.key_index(kind);
            let changes = self.change_count(kind, prior, &known, analysis.log.as_ref());
            let outcome = merge(kind, prior, analysis.index.auto_region(kind)?, changes, now);

            let backup = match prior {
                PriorManifest::Corrupt { raw, .. } if !raw.is_empty() => Some(raw.as_slice()),
                _ => None,
            };
            if let Some(reason) = &outcome.recovered_from {
                let detail = match backup {
                    Some(_) => format!(
                        "rebuilt from scratch ({}); previous content saved to {}",
                        reason,
                        self.store.corrupt_backup_path(kind).display()
                    ),
                    None => format!("rebuilt from scratch ({})", reason),
                };
                report.issues.push(Issue::new(
                    IssueKind::CorruptManifest,
                    self.store.path_for(kind).display().to_string(),
                    detail,
                ));
            }
            report.issues.extend(ignored_keys_issue(kind, prior));
            if !outcome.dropped_keys.is_empty() {
                report.issues.push(Issue::new(
                    IssueKind::DroppedKeys,
                    kind.to_string(),
                    format!(
                        "hand-edited keys outside '_manual' were replaced: {}",
                        outcome.dropped_keys.join(", ")
                    ),
                ));
            }

            let markdown = render_markdown(kind, &outcome.document)?;
            staged.push(
                self.store
                    .stage(kind, &outcome.document, markdown.as_deref(), backup)?,
            );

            let documented = documented_index(kind, &outcome.document.auto)?;
            updates.push(ManifestUpdate {
                kind,
                version: outcome.document.metadata.version,
                changes,
                coverage: Coverage::between(&known, &documented),
                path: self.store.path_for(kind),
                created: !prior.exists(),
                rebuilt: outcome.recovered_from.is_some(),
            });
        }

        let written = self.store.commit(staged)?;
        tracing::info!(
            "Wrote {} manifests ({} files) to {}",
            updates.len(),
            written.len(),
            self.store.dir().display()
        );
        report.updated = updates;
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn load_priors(&self, kinds: &[ManifestKind]) -> Vec<(ManifestKind, PriorManifest)> {
        kinds.iter().map(|kind| (*kind, self.store.load(*kind))).collect()
    }

    /// Scan and extract, reading history in parallel with extraction.
    fn analyze(&mut self, priors: &[(ManifestKind, PriorManifest)]) -> Analysis {
        self.enter(Phase::Scanning);
        let scanned = scan(self.ctx);
        tracing::info!("Found {} source files under {}", scanned.files.len(), self.ctx.root().display());

        self.enter(Phase::Extracting);
        let earliest = priors
            .iter()
            .filter_map(|(_, prior)| prior.document())
            .map(|doc| doc.metadata.last_updated)
            .min();
        let coordinator = Coordinator::new(self.ctx);
        let history = &self.history;
        let (batch, log) = rayon::join(
            || coordinator.extract_all(&scanned.files),
            || earliest.map(|since| history.log_since(since)),
        );

        self.enter(Phase::DetectingChanges);
        let log = match log {
            Some(Ok(log)) => {
                tracing::debug!("Read {} commits of history", log.commits.len());
                Some(log)
            }
            Some(Err(e)) => {
                tracing::debug!("No version-control history ({}); staleness uses manifest age only", e);
                None
            }
            None => None,
        };

        let index = RepositoryIndex::assemble(self.ctx.root(), &scanned.files, scanned.issues, batch);
        Analysis { index, log }
    }

    /// Net changes since `since` to paths any manifest is derived from.
    fn relevant_changes(&self, log: &ChangeLog, since: DateTime<Utc>) -> ChangeSet {
        let mut changes = log.since(since);
        changes.retain(|path| {
            path == PACKAGE_JSON
                || path == CARGO_TOML
                || (self.ctx.is_source_file(path) && !self.ctx.is_excluded(path, false))
        });
        changes
    }

    fn change_count(
        &self,
        kind: ManifestKind,
        prior: &PriorManifest,
        known: &KeyIndex,
        log: Option<&ChangeLog>,
    ) -> u64 {
        match (prior, log) {
            (PriorManifest::Loaded(doc), Some(log)) => {
                self.relevant_changes(log, doc.metadata.last_updated).len() as u64
            }
            (PriorManifest::Loaded(doc), None) => {
                let previous = documented_index(kind, &doc.auto).unwrap_or_default();
                key_delta(&previous, known)
            }
            _ => key_delta(&KeyIndex::new(), known),
        }
    }

    fn assess(
        &self,
        kind: ManifestKind,
        prior: &PriorManifest,
        analysis: &Analysis,
        now: DateTime<Utc>,
    ) -> ManifestAssessment {
        let known = analysis.index.key_index(kind);
        let mut assessment = ManifestAssessment {
            kind,
            state: ManifestState::Missing,
            coverage: Coverage::new(0, key_count(&known)),
            version: None,
            days_since_update: None,
            added_files: Vec::new(),
            modified_files: Vec::new(),
            deleted_files: Vec::new(),
            missing_items: Vec::new(),
            orphaned_items: Vec::new(),
        };

        let doc = match prior {
            PriorManifest::Missing => return assessment,
            PriorManifest::Corrupt { reason, .. } => {
                assessment.state = ManifestState::Stale(vec![StaleReason::Unreadable(reason.clone())]);
                return assessment;
            }
            PriorManifest::Loaded(doc) => doc,
        };
        assessment.version = Some(doc.metadata.version);

        let documented = match documented_index(kind, &doc.auto) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Manifest '{}' has a malformed auto region: {}", kind, e);
                assessment.state = ManifestState::Stale(vec![StaleReason::Unreadable(e.to_string())]);
                return assessment;
            }
        };
        assessment.coverage = Coverage::between(&known, &documented);

        let mut reasons = Vec::new();
        if let Some(log) = &analysis.log {
            let changes = self.relevant_changes(log, doc.metadata.last_updated);
            let owned = |status: ChangeStatus| -> Vec<String> {
                changes.with_status(status).map(str::to_string).collect()
            };
            assessment.added_files = owned(ChangeStatus::Added);
            assessment.modified_files = owned(ChangeStatus::Modified);
            assessment.deleted_files = owned(ChangeStatus::Deleted);

            assessment.missing_items = changes
                .touched()
                .filter(|path| known.get(*path).is_some_and(|keys| !keys.is_empty()))
                .filter(|path| documented.get(*path).is_none_or(|keys| keys.is_empty()))
                .map(str::to_string)
                .collect();
            assessment.orphaned_items = changes
                .with_status(ChangeStatus::Deleted)
                .filter(|path| documented.get(*path).is_some_and(|keys| !keys.is_empty()))
                .map(str::to_string)
                .collect();

            if !assessment.missing_items.is_empty() {
                reasons.push(StaleReason::MissingItems(assessment.missing_items.len()));
            }
            if !assessment.orphaned_items.is_empty() {
                reasons.push(StaleReason::OrphanedItems(assessment.orphaned_items.len()));
            }
        }

        let days = (now - doc.metadata.last_updated).num_days();
        assessment.days_since_update = Some(days);
        if days > self.ctx.stale_after_days() {
            reasons.push(StaleReason::Age { days });
        }

        assessment.state = if reasons.is_empty() {
            ManifestState::Current
        } else {
            ManifestState::Stale(reasons)
        };
        assessment
    }
}

fn index_issues(index: &RepositoryIndex) -> Vec<Issue> {
    let scan = index.scan_issues.iter().map(|issue| {
        Issue::new(
            IssueKind::Scan,
            issue.path.clone().unwrap_or_else(|| ".".to_string()),
            issue.reason.clone(),
        )
    });
    let extraction = index
        .extraction_errors
        .iter()
        .map(|e| Issue::new(IssueKind::Extraction, e.path.clone(), e.reason.clone()));
    let manifests = index
        .manifest_issues
        .iter()
        .map(|e| Issue::new(IssueKind::DependencyManifest, e.path.clone(), e.reason.clone()));
    scan.chain(extraction).chain(manifests).collect()
}

fn ignored_keys_issue(kind: ManifestKind, prior: &PriorManifest) -> Option<Issue> {
    let doc = prior.document()?;
    if doc.ignored_keys.is_empty() {
        return None;
    }
    Some(Issue::new(
        IssueKind::IgnoredKeys,
        kind.to_string(),
        format!(
            "unrecognised reserved keys are not preserved: {}; move them under '_manual'",
            doc.ignored_keys.join(", ")
        ),
    ))
}
