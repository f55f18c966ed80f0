//! Cartograph CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use cartograph_core::ManifestKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cartograph")]
#[command(about = "Codebase intelligence manifests for TypeScript and JavaScript repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Manifest directory, relative to the root unless absolute
    #[arg(long, global = true)]
    manifest_dir: Option<PathBuf>,

    /// Extra exclusion glob (repeatable)
    #[arg(short, long = "exclude", global = true)]
    exclude: Vec<String>,

    /// Treat stale manifests as a failure
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report each manifest as current, stale or missing
    Status,
    /// Rebuild manifests from the current tree
    #[command(alias = "refresh")]
    Update {
        /// Only these manifests (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<ManifestKind>,
    },
    /// Write manifests that do not exist yet
    Create,
    /// Show version
    Version,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cartograph={level},cartograph_core={level},cartograph_indexer={level},cartograph_pipeline={level}"
        ))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = commands::Options {
        root: cli.root,
        manifest_dir: cli.manifest_dir,
        exclude: cli.exclude,
        strict: cli.strict,
    };

    let result = match cli.command {
        Commands::Status => commands::status(&options),
        Commands::Update { only } => commands::update(&options, &only),
        Commands::Create => commands::create(&options),
        Commands::Version => {
            println!("cartograph v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
