//! Run configuration

use crate::aggregator::ProgressDisplay;
use std::path::{Path, PathBuf};

/// Upper bound for the worker count; exiftool is process-heavy.
pub const MAX_JOBS: usize = 32;

pub const DEFAULT_EXIFTOOL: &str = "exiftool";

/// Worker count from the CPU count, clamped to `1..=MAX_JOBS`.
pub fn default_jobs() -> usize {
    clamp_jobs(num_cpus::get())
}

pub fn clamp_jobs(jobs: usize) -> usize {
    jobs.clamp(1, MAX_JOBS)
}

/// Where authoritative timestamps come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceVariant {
    /// `.json` files next to the media
    Sidecar,
    /// Photo-library database (bundle directory or `.sqlite` file)
    LibraryIndex(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub variant: SourceVariant,
    pub jobs: usize,
    pub exiftool: PathBuf,
    pub progress: ProgressDisplay,
}

impl RunConfig {
    pub fn new<S: AsRef<Path>, D: AsRef<Path>>(source_root: S, destination_root: D) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
            destination_root: destination_root.as_ref().to_path_buf(),
            variant: SourceVariant::Sidecar,
            jobs: default_jobs(),
            exiftool: PathBuf::from(DEFAULT_EXIFTOOL),
            progress: ProgressDisplay::Terminal,
        }
    }

    pub fn with_library(mut self, library: Option<PathBuf>) -> Self {
        self.variant = match library {
            Some(path) => SourceVariant::LibraryIndex(path),
            None => SourceVariant::Sidecar,
        };
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = clamp_jobs(jobs);
        self
    }

    pub fn with_exiftool<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.exiftool = program.as_ref().to_path_buf();
        self
    }

    pub fn with_progress(mut self, progress: ProgressDisplay) -> Self {
        self.progress = progress;
        self
    }
}
