//! CLI command implementations

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use cartograph_core::{Config, Coverage, ManifestKind, ScanContext};
use cartograph_pipeline::{
    Issue, ManifestAssessment, ManifestState, Orchestrator, RefreshReport, StatusReport,
};
use colored::Colorize;

const BAR_WIDTH: usize = 20;
const MAX_LISTED_PATHS: usize = 10;

/// Flags shared by every command.
pub struct Options {
    pub root: PathBuf,
    pub manifest_dir: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub strict: bool,
}

/// Build the scan context: `cartograph.toml`, then environment, then flags.
fn context(options: &Options) -> anyhow::Result<ScanContext> {
    let mut config = Config::load(&options.root)
        .with_context(|| format!("Failed to load config under {}", options.root.display()))?;
    config
        .apply_env()
        .context("Invalid CARTOGRAPH_* environment override")?;
    if let Some(dir) = &options.manifest_dir {
        config.manifest_dir = dir.clone();
    }
    config.exclude.extend(options.exclude.iter().cloned());
    config.strict |= options.strict;

    let ctx = ScanContext::new(&options.root, &config)
        .with_context(|| format!("Cannot scan {}", options.root.display()))?;
    tracing::debug!("Repository root: {}", ctx.root().display());
    Ok(ctx)
}

pub fn status(options: &Options) -> anyhow::Result<ExitCode> {
    let ctx = context(options)?;
    let report = Orchestrator::new(&ctx).status();

    println!(
        "{} {}",
        "Manifests in".dimmed(),
        ctx.manifest_dir().display()
    );
    for manifest in &report.manifests {
        print_assessment(manifest);
    }
    if !report.history_available && report.manifests.iter().any(|m| m.version.is_some()) {
        println!(
            "{}",
            "No version-control history; staleness is based on manifest age only".dimmed()
        );
    }
    print_issues(&report.issues);

    let code = status_code(&report, ctx.strict());
    Ok(ExitCode::from(code))
}

fn status_code(report: &StatusReport, strict: bool) -> u8 {
    u8::try_from(report.exit_code(strict)).unwrap_or(1)
}

fn print_assessment(manifest: &ManifestAssessment) {
    let state = match &manifest.state {
        ManifestState::Current => manifest.state.to_string().green().bold(),
        ManifestState::Stale(_) => manifest.state.to_string().yellow().bold(),
        ManifestState::Missing => manifest.state.to_string().red().bold(),
    };
    let version = manifest
        .version
        .map(|v| format!("v{}", v))
        .unwrap_or_default();
    println!(
        "  {:<12} {}  {}  {}",
        manifest.kind.to_string(),
        coverage_bar(&manifest.coverage),
        state,
        version.dimmed()
    );

    for (label, paths) in [
        ("missing", &manifest.missing_items),
        ("orphaned", &manifest.orphaned_items),
    ] {
        for path in paths.iter().take(MAX_LISTED_PATHS) {
            println!("      {} {}", format!("{}:", label).dimmed(), path);
        }
        if paths.len() > MAX_LISTED_PATHS {
            println!(
                "      {}",
                format!("… and {} more", paths.len() - MAX_LISTED_PATHS).dimmed()
            );
        }
    }
}

fn coverage_bar(coverage: &Coverage) -> String {
    format!(
        "{} {:>3}% ({}/{})",
        coverage.bar(BAR_WIDTH),
        coverage.percent,
        coverage.documented,
        coverage.total
    )
}

pub fn update(options: &Options, only: &[ManifestKind]) -> anyhow::Result<ExitCode> {
    let ctx = context(options)?;
    let kinds: Vec<ManifestKind> = if only.is_empty() {
        ManifestKind::ALL.to_vec()
    } else {
        ManifestKind::ALL
            .into_iter()
            .filter(|kind| only.contains(kind))
            .collect()
    };

    let report = Orchestrator::new(&ctx)
        .refresh(&kinds)
        .context("Refresh failed; existing manifests were left unchanged")?;
    print_refresh(&report);
    Ok(ExitCode::SUCCESS)
}

pub fn create(options: &Options) -> anyhow::Result<ExitCode> {
    let ctx = context(options)?;
    let report = Orchestrator::new(&ctx)
        .create()
        .context("Create failed; existing manifests were left unchanged")?;

    if report.updated.is_empty() {
        println!("{}", "All manifests already exist".dimmed());
    }
    print_refresh(&report);
    for kind in &report.skipped {
        println!("  {:<12} {}", kind.to_string(), "exists, left untouched".dimmed());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_refresh(report: &RefreshReport) {
    if !report.updated.is_empty() {
        println!(
            "{} {} files, {} symbols",
            "Scanned".dimmed(),
            report.files_scanned,
            report.symbols
        );
    }
    for update in &report.updated {
        let action = if update.created {
            "created".green()
        } else if update.rebuilt {
            "rebuilt".yellow()
        } else {
            "updated".green()
        };
        println!(
            "  {:<12} {:<8} v{:<4} {:>4} changes  {}",
            update.kind.to_string(),
            action,
            update.version,
            update.changes,
            coverage_bar(&update.coverage)
        );
    }
    print_issues(&report.issues);
}

fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        return;
    }
    println!();
    println!("{}", format!("Issues ({})", issues.len()).yellow().bold());
    for issue in issues {
        println!("  {}", issue);
    }
}
