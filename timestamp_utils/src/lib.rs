//! Shared library for the fix_timestamps tool
//!
//! Restores capture timestamps on exported photo and video collections:
//! - Source tree classification (media / sidecar / unrecognized)
//! - Correlation of media files with their metadata records
//!   (sidecar `.json` files or a photo-library index)
//! - Resilient exiftool writes with a staged recovery cascade
//! - Concurrent copy+write engine with a single progress aggregator
//! - Logging, error types and the end-of-run report

pub mod aggregator;
pub mod classifier;
pub mod common_utils;
pub mod config;
pub mod correlator;
pub mod engine;
pub mod errors;
pub mod exiftool;
pub mod logging;
pub mod modern_ui;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod sources;
pub mod timestamps;
pub mod writer;
#[cfg(test)]
mod test_support;

pub use aggregator::{Aggregator, AggregatorHandle, ProgressDisplay, Summary};
pub use classifier::{classify, Classification, ClassifierConfig, MediaFile};
pub use config::{default_jobs, RunConfig, SourceVariant};
pub use correlator::{correlate, Correlation, MissingReport, Resolution};
pub use engine::{run_job, run_jobs, Job, JobOutcome, WorkerPool};
pub use errors::{JobError, PreflightError, SourceError, WriteFailure};
pub use exiftool::{ExifTool, MetadataTool, TagPlan, ToolOutput};
pub use logging::{init_logging, LogConfig};
pub use report::{print_summary_report, RunSummary};
pub use sources::{LibraryIndex, MetadataSource, SidecarCatalog, SourceCatalog};
pub use timestamps::TimestampAttributes;
pub use writer::{WriteOutcome, Writer};
