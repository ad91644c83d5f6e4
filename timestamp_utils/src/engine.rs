//! Concurrent job engine
//!
//! Every matched file becomes one [`Job`]: copy the original to its
//! destination, read the authoritative timestamps, write them. Jobs run on
//! an explicit worker pool; a failed job is reported and counted, never
//! allowed to stop the batch.

use crate::aggregator::AggregatorHandle;
use crate::common_utils::{copy_file_with_context, file_name_lossy};
use crate::errors::JobError;
use crate::modern_ui::symbols;
use crate::sources::MetadataSource;
use crate::writer::{WriteOutcome, Writer};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::PathBuf;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("fix-worker-{}", i))
            .build()
            .context("Failed to build worker pool")?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub source: MetadataSource,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub source_path: PathBuf,
    pub result: Result<WriteOutcome, JobError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Copy, then read timestamps, then write. The copy always overwrites.
pub fn run_job(job: &Job, writer: &Writer) -> Result<WriteOutcome, JobError> {
    copy_file_with_context(&job.source_path, &job.destination_path).map_err(JobError::Copy)?;
    let attrs = job.source.timestamps()?;
    Ok(writer.write(&job.destination_path, &attrs)?)
}

/// Run every job on `pool`, reporting each one to `progress`.
/// Outcomes are returned in job order.
pub fn run_jobs(
    pool: &WorkerPool,
    jobs: &[Job],
    writer: &Writer,
    progress: &AggregatorHandle,
) -> Vec<JobOutcome> {
    pool.pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let result = run_job(job, writer);
                report(job, &result, progress);
                JobOutcome {
                    source_path: job.source_path.clone(),
                    result,
                }
            })
            .collect()
    })
}

fn report(job: &Job, result: &Result<WriteOutcome, JobError>, progress: &AggregatorHandle) {
    let name = file_name_lossy(&job.source_path);
    match result {
        Ok(outcome) => {
            tracing::debug!(
                source = %job.source_path.display(),
                destination = %outcome.path.display(),
                from = %job.source.describe(),
                "Timestamps written"
            );
            if outcome.path != job.destination_path {
                progress.log(format!(
                    "{} {} {} {}",
                    symbols::CHECK,
                    name,
                    symbols::ARROW_RIGHT,
                    file_name_lossy(&outcome.path)
                ));
            }
            if let Some(stage) = outcome.recovered_by {
                progress.log(format!("{} {} (recovered: {})", symbols::CHECK, name, stage));
            }
        }
        Err(e) => {
            tracing::error!(source = %job.source_path.display(), error = %e, "Job failed");
            progress.error(format!("{} {}: {}", symbols::CROSS, job.source_path.display(), e));
        }
    }
    progress.increment();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregator, ProgressDisplay};
    use crate::sources::{IndexRecord, SidecarRecord};
    use crate::test_support::ScriptedTool;
    use proptest::prelude::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn index_source(row_id: i64) -> MetadataSource {
        MetadataSource::Index(IndexRecord {
            row_id,
            original_name: format!("{}.jpg", row_id),
            original_size: None,
            created: 400_000_000.0,
            modified: None,
        })
    }

    fn make_jobs(root: &Path, total: usize, failing: usize) -> Vec<Job> {
        (0..total)
            .map(|i| {
                let name = if i < failing {
                    format!("fail_{}.jpg", i)
                } else {
                    format!("ok_{}.jpg", i)
                };
                let source_path = root.join("src").join(&name);
                fs::create_dir_all(source_path.parent().unwrap()).unwrap();
                fs::write(&source_path, b"jpeg").unwrap();
                Job {
                    source_path,
                    destination_path: root.join("dst").join("album").join(&name),
                    source: index_source(i as i64),
                }
            })
            .collect()
    }

    fn execute(jobs: &[Job], threads: usize, writer: &Writer) -> (Vec<JobOutcome>, crate::aggregator::Summary) {
        let pool = WorkerPool::new(threads).unwrap();
        let aggregator = Aggregator::spawn(jobs.len(), "test", ProgressDisplay::Hidden).unwrap();
        let outcomes = run_jobs(&pool, jobs, writer, &aggregator.handle());
        (outcomes, aggregator.finish().unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_every_job_counted_once(total in 0usize..24, failing_ratio in 0.0f64..=1.0, threads in 1usize..6) {
            let failing = (total as f64 * failing_ratio) as usize;
            let temp = TempDir::new().unwrap();
            let jobs = make_jobs(temp.path(), total, failing);
            let writer = Writer::new(Arc::new(ScriptedTool::failing_on("fail_")));

            let (outcomes, summary) = execute(&jobs, threads, &writer);

            prop_assert_eq!(summary.total, total);
            prop_assert_eq!(summary.completed, total);
            prop_assert_eq!(summary.error_count(), failing);
            prop_assert_eq!(outcomes.iter().filter(|o| !o.is_success()).count(), failing);
            prop_assert_eq!(outcomes.len(), total);
        }
    }

    #[test]
    fn test_job_copies_into_new_directories() {
        let temp = TempDir::new().unwrap();
        let jobs = make_jobs(temp.path(), 3, 0);
        let writer = Writer::new(Arc::new(ScriptedTool::succeeding()));

        let (outcomes, summary) = execute(&jobs, 2, &writer);
        assert_eq!(summary.error_count(), 0);
        for (job, outcome) in jobs.iter().zip(&outcomes) {
            assert_eq!(outcome.source_path, job.source_path);
            assert!(job.destination_path.exists());
        }
    }

    #[test]
    fn test_copy_and_source_failures_are_isolated() {
        let temp = TempDir::new().unwrap();
        let mut jobs = make_jobs(temp.path(), 3, 0);
        jobs[0].source_path = temp.path().join("src/vanished.jpg");
        jobs[1].source = MetadataSource::Sidecar(SidecarRecord::new(temp.path().join("src/none.json")));

        let writer = Writer::new(Arc::new(ScriptedTool::succeeding()));
        let (outcomes, summary) = execute(&jobs, 3, &writer);

        assert!(matches!(outcomes[0].result, Err(JobError::Copy(_))));
        assert!(matches!(outcomes[1].result, Err(JobError::Source(_))));
        assert!(outcomes[2].is_success());
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.error_count(), 2);
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(WorkerPool::new(3).unwrap().threads(), 3);
        assert_eq!(WorkerPool::new(0).unwrap().threads(), 1);
    }
}
