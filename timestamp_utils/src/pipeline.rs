//! One full run: pre-flight, correlation, then the concurrent copy+write
//! phase. Nothing is copied unless classification and correlation are both
//! complete.

use crate::aggregator::Aggregator;
use crate::classifier::{classify, ClassifierConfig};
use crate::common_utils::reroot;
use crate::config::{RunConfig, SourceVariant};
use crate::correlator::{correlate, Correlation};
use crate::engine::{run_jobs, Job, WorkerPool};
use crate::errors::PreflightError;
use crate::exiftool::MetadataTool;
use crate::report::RunSummary;
use crate::sources::{LibraryIndex, SidecarCatalog, SourceCatalog};
use crate::writer::Writer;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Canonical source root, absolute destination root, and the subtree the
/// classifier must skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub exclude: Option<PathBuf>,
}

pub fn resolve_roots(source: &Path, destination: &Path) -> Result<Roots> {
    if !source.is_dir() {
        return Err(PreflightError::SourceNotDirectory(source.to_path_buf()).into());
    }
    let source = source
        .canonicalize()
        .with_context(|| format!("Failed to resolve source: {}", source.display()))?;
    let destination = resolve_destination(destination)
        .with_context(|| format!("Failed to resolve destination: {}", destination.display()))?;

    if destination == source {
        return Err(PreflightError::DestinationIsSource(destination).into());
    }
    let exclude = destination.starts_with(&source).then(|| destination.clone());

    Ok(Roots {
        source,
        destination,
        exclude,
    })
}

/// Canonicalize the longest existing prefix; the rest may not exist yet.
fn resolve_destination(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return path.canonicalize();
    }
    let absolute = std::path::absolute(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve_destination(parent)?.join(name)),
        _ => Ok(absolute),
    }
}

/// Classify the source tree and correlate it against the configured
/// catalog. Fails on unknown extensions or any missing record.
pub fn prepare(config: &RunConfig, roots: &Roots) -> Result<Correlation> {
    let classifier = match config.variant {
        SourceVariant::Sidecar => ClassifierConfig::sidecar_export(),
        SourceVariant::LibraryIndex(_) => ClassifierConfig::library_export(),
    }
    .with_exclude(roots.exclude.clone());

    let classification = classify(&roots.source, &classifier)?.ensure_complete()?;

    let catalog: Box<dyn SourceCatalog> = match &config.variant {
        SourceVariant::Sidecar => Box::new(
            SidecarCatalog::new(classification.sidecars).context("Invalid name rule")?,
        ),
        SourceVariant::LibraryIndex(library) => Box::new(LibraryIndex::open(library)?),
    };

    Ok(correlate(&classification.media, catalog.as_ref()).validate()?)
}

pub fn build_jobs(correlation: &Correlation, roots: &Roots) -> Vec<Job> {
    correlation
        .matched
        .iter()
        .map(|m| Job {
            source_path: m.media.path.clone(),
            destination_path: reroot(&m.media.path, &roots.source, &roots.destination),
            source: m.source.clone(),
        })
        .collect()
}

pub fn run(config: &RunConfig, tool: Arc<dyn MetadataTool>) -> Result<RunSummary> {
    let start = Instant::now();
    let roots = resolve_roots(&config.source_root, &config.destination_root)?;
    let correlation = prepare(config, &roots)?;
    let jobs = build_jobs(&correlation, &roots);

    tracing::info!(
        jobs = jobs.len(),
        workers = config.jobs,
        tool = %config.exiftool.display(),
        destination = %roots.destination.display(),
        "Starting copy and write phase"
    );

    let writer =
        Writer::new(tool).with_reserved_paths(jobs.iter().map(|j| j.destination_path.clone()));
    let pool = WorkerPool::new(config.jobs)?;
    let aggregator = Aggregator::spawn(jobs.len(), "Fixing", config.progress)?;
    let outcomes = run_jobs(&pool, &jobs, &writer, &aggregator.handle());
    let progress = aggregator.finish()?;

    let mut summary = RunSummary {
        media: correlation.total(),
        omitted: correlation.omitted.len(),
        jobs: jobs.len(),
        rules: correlation.rule_counts(),
        ..RunSummary::default()
    };
    for (job, outcome) in jobs.iter().zip(&outcomes) {
        summary.record(outcome, &job.destination_path);
    }
    summary.duration = start.elapsed();

    if progress.completed != summary.jobs || progress.error_count() != summary.failed {
        tracing::warn!(
            completed = progress.completed,
            errors = progress.error_count(),
            "Progress counters disagree with job outcomes"
        );
    }
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        omitted = summary.omitted,
        duration_secs = summary.duration.as_secs_f64(),
        "Run complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ProgressDisplay;
    use crate::test_support::ScriptedTool;
    use std::fs;
    use tempfile::TempDir;

    fn sidecar(path: &Path, taken: i64) {
        fs::write(
            path,
            format!(r#"{{"photoTakenTime":{{"timestamp":"{}"}}}}"#, taken),
        )
        .unwrap();
    }

    fn config(source: &Path, destination: &Path) -> RunConfig {
        RunConfig::new(source, destination)
            .with_jobs(2)
            .with_progress(ProgressDisplay::Hidden)
    }

    #[test]
    fn test_nested_destination_is_excluded() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("takeout");
        fs::create_dir_all(src.join("out/old")).unwrap();
        fs::write(src.join("out/old/stray.txt"), b"x").unwrap();
        fs::write(src.join("a.jpg"), b"jpeg").unwrap();
        sidecar(&src.join("a.jpg.json"), 1_453_394_430);

        let roots = resolve_roots(&src, &src.join("out")).unwrap();
        assert!(roots.exclude.is_some());

        let correlation = prepare(&config(&src, &src.join("out")), &roots).unwrap();
        assert_eq!(correlation.matched.len(), 1);
    }

    #[test]
    fn test_destination_equal_to_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = resolve_roots(temp.path(), temp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreflightError>(),
            Some(PreflightError::DestinationIsSource(_))
        ));
    }

    #[test]
    fn test_missing_metadata_stops_before_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("Album")).unwrap();
        fs::write(src.join("Album/a.jpg"), b"jpeg").unwrap();
        sidecar(&src.join("Album/a.jpg.json"), 0);
        fs::write(src.join("Album/orphan.jpg"), b"jpeg").unwrap();

        let tool = Arc::new(ScriptedTool::succeeding());
        let err = run(&config(&src, &dst), tool.clone()).unwrap_err();

        match err.downcast_ref::<PreflightError>() {
            Some(PreflightError::MissingMetadata(report)) => assert_eq!(report.total, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!dst.exists());
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn test_unknown_extension_stops_before_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("notes.txt"), b"x").unwrap();

        let err = run(&config(&src, &temp.path().join("dst")), Arc::new(ScriptedTool::succeeding()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreflightError>(),
            Some(PreflightError::UnknownExtensions(_))
        ));
    }

    #[test]
    fn test_run_copies_matched_and_skips_omitted() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("Trip")).unwrap();
        fs::write(src.join("Trip/IMG_1.jpg"), b"one").unwrap();
        fs::write(src.join("Trip/IMG_1(1).jpg"), b"dup").unwrap();
        sidecar(&src.join("Trip/IMG_1.jpg.json"), 1_453_394_430);

        let summary = run(&config(&src, &dst), Arc::new(ScriptedTool::succeeding())).unwrap();
        assert_eq!(summary.media, 2);
        assert_eq!(summary.jobs, 1);
        assert_eq!(summary.omitted, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(dst.join("Trip/IMG_1.jpg").exists());
        assert!(!dst.join("Trip/IMG_1(1).jpg").exists());
    }
}
