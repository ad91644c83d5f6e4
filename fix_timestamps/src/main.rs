// ============================================================================
// fix_timestamps CLI
// ============================================================================
//
// Copies an exported photo/video collection to a new tree and restores the
// capture timestamps from the export's metadata.
//
// Usage:
//   fix_timestamps ~/Takeout/Photos ~/Fixed
//   fix_timestamps ~/Export ~/Fixed ~/Pictures/Photos.photoslibrary
//   fix_timestamps -j 4 --verbose ~/Takeout/Photos ~/Fixed
//
// ============================================================================

use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use timestamp_utils::config::DEFAULT_EXIFTOOL;
use timestamp_utils::logging::{init_logging, LogConfig};
use timestamp_utils::{
    default_jobs, pipeline, print_summary_report, ExifTool, PreflightError, RunConfig,
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "fix_timestamps")]
#[command(version, about = "Restore capture timestamps on exported photos and videos", long_about = None)]
struct Cli {
    /// Exported collection (read-only)
    source: PathBuf,

    /// Where the fixed copies are written
    destination: PathBuf,

    /// Photo-library bundle or database; without it `.json` sidecars are used
    library: Option<PathBuf>,

    /// Parallel workers
    #[arg(short = 'j', long, env = "FIX_TIMESTAMPS_JOBS", default_value_t = default_jobs())]
    jobs: usize,

    /// exiftool executable (name or path)
    #[arg(long, env = "FIX_TIMESTAMPS_EXIFTOOL", default_value = DEFAULT_EXIFTOOL)]
    exiftool: PathBuf,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Mirror debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::new().with_stderr(cli.verbose);
    if cli.verbose {
        log_config = log_config.with_level(Level::DEBUG);
    }
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    let _guard = match init_logging("fix_timestamps", log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging disabled: {:#}", style("⚠️").yellow(), e);
            None
        }
    };

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Run aborted");
            match e.downcast_ref::<PreflightError>() {
                Some(preflight) => eprintln!("{}\n{}", style("❌ Pre-flight check failed").red().bold(), preflight),
                None => eprintln!("{} {:#}", style("❌ Error:").red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

/// `Ok(true)` when every job succeeded.
fn execute(cli: &Cli) -> Result<bool> {
    let tool = ExifTool::locate(&cli.exiftool)?;
    tracing::info!(
        program = %tool.program().display(),
        source = %cli.source.display(),
        destination = %cli.destination.display(),
        library = ?cli.library,
        jobs = cli.jobs,
        "fix_timestamps started"
    );

    let config = RunConfig::new(&cli.source, &cli.destination)
        .with_library(cli.library.clone())
        .with_jobs(cli.jobs)
        .with_exiftool(tool.program());

    let summary = pipeline::run(&config, Arc::new(tool))?;
    print_summary_report(&summary);
    Ok(!summary.has_failures())
}
