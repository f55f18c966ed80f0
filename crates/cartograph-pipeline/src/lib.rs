//! Change detection and the refresh / status / create pipeline

pub mod error;
pub mod history;
pub mod orchestrator;
pub mod report;


pub use error::{HistoryError, PipelineError};
pub use history::{ChangeLog, ChangeSet, ChangeStatus, Commit, GitHistory, VersionControl};
pub use orchestrator::{Clock, Orchestrator, Phase, SystemClock};
pub use report::{
    Issue, IssueKind, ManifestAssessment, ManifestState, ManifestUpdate, RefreshReport,
    StaleReason, StatusReport,
};
