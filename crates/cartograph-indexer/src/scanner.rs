//! Source file discovery
//!
//! Walks the scan root with the `ignore` walker, prunes excluded directories
//! before descending into them, and returns source files sorted by their
//! root-relative path.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cartograph_core::{ScanContext, relative_path};
use ignore::WalkBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative to the scan root, `/`-separated.
    pub relative: String,
    pub absolute: PathBuf,
}

/// An entry the walker could not read. Scanning continues past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIssue {
    pub path: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<SourceFile>,
    pub issues: Vec<ScanIssue>,
}

/// Enumerate source files under the context root.
pub fn scan(ctx: &ScanContext) -> ScanOutcome {
    let filter_ctx = ctx.clone();
    let walker = WalkBuilder::new(ctx.root())
        .hidden(true)
        .git_ignore(ctx.respect_gitignore())
        .git_global(ctx.respect_gitignore())
        .git_exclude(ctx.respect_gitignore())
        .require_git(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let path = entry.path();
            if path.starts_with(filter_ctx.manifest_dir()) {
                return false;
            }
            let Some(relative) = relative_path(filter_ctx.root(), path) else {
                return false;
            };
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !filter_ctx.is_excluded(&relative, is_dir)
        })
        .build();

    let mut files = BTreeMap::new();
    let mut issues = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = error_path(&err);
                tracing::warn!("Skipping unreadable entry: {}", err);
                issues.push(ScanIssue {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let Some(relative) = relative_path(ctx.root(), entry.path()) else {
            continue;
        };
        if !ctx.is_source_file(&relative) {
            continue;
        }
        files.insert(relative, entry.into_path());
    }

    tracing::debug!(
        "Scanned {}: {} source files, {} unreadable entries",
        ctx.root().display(),
        files.len(),
        issues.len()
    );

    ScanOutcome {
        files: files
            .into_iter()
            .map(|(relative, absolute)| SourceFile { relative, absolute })
            .collect(),
        issues,
    }
}

fn error_path(err: &ignore::Error) -> Option<String> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.display().to_string()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.display().to_string()),
        _ => None,
    }
}
