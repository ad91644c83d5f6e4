//! Error types
//!
//! - `PreflightError`: aborts the run before anything is copied.
//! - `SourceError`: a metadata source could not yield timestamps.
//! - `WriteFailure`: the writer exhausted its recovery cascade.
//! - `JobError`: terminal failure of one copy+write job.

use crate::correlator::MissingReport;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("Source is not a directory: {0}")]
    SourceNotDirectory(PathBuf),

    #[error("Destination must differ from source: {0}")]
    DestinationIsSource(PathBuf),

    #[error("Metadata tool not found: {0} (install exiftool or pass --exiftool)")]
    ToolNotFound(String),

    #[error("{}", format_unreadable(.0))]
    Unreadable(Vec<PathBuf>),

    #[error("{}", format_unknown_extensions(.0))]
    UnknownExtensions(BTreeMap<String, usize>),

    #[error("{0}")]
    MissingMetadata(MissingReport),
}

fn format_unreadable(paths: &[PathBuf]) -> String {
    let mut msg = String::from("Unreadable entries in the source tree:\n");
    for path in paths {
        let _ = writeln!(msg, "  {}", path.display());
    }
    msg.push_str("Stopping: fix permissions or remove these entries before re-running");
    msg
}

fn format_unknown_extensions(counts: &BTreeMap<String, usize>) -> String {
    let mut msg = String::from("Unknown extensions:\n");
    for (ext, count) in counts {
        let shown = if ext.is_empty() { "(none)" } else { ext.as_str() };
        let _ = writeln!(msg, "  .{}: {}", shown, count);
    }
    msg.push_str("Stopping: classify or remove these files before re-running");
    msg
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read sidecar {path}: {source}")]
    SidecarRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse sidecar {path}: {source}")]
    SidecarParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sidecar {path} has no usable `{field}` timestamp")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Timestamp out of range: {0}")]
    OutOfRange(f64),

    #[error("Library index {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Library index {0} has no asset table")]
    IndexSchema(PathBuf),
}

/// Terminal writer failure: every applicable recovery stage failed.
#[derive(Error, Debug)]
#[error("metadata write failed for {} after {stage}: {}", .path.display(), .diagnostic.trim())]
pub struct WriteFailure {
    /// Working path at the time of the last attempt (may carry a corrected extension)
    pub path: PathBuf,
    /// Last stage attempted
    pub stage: &'static str,
    /// Captured tool output of the last failing invocation
    pub diagnostic: String,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("copy failed: {0:#}")]
    Copy(anyhow::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Write(#[from] WriteFailure),
}
