//! End-of-run summary

use crate::engine::JobOutcome;
use crate::modern_ui::{format_duration, symbols};
use console::style;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Media files found under the source root
    pub media: usize,
    pub omitted: usize,
    /// Copy+write jobs started (one per matched file)
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful writes that needed a recovery stage, per stage
    pub recovered: BTreeMap<&'static str, usize>,
    /// Files that ended up with a corrected extension
    pub renamed: usize,
    /// Matches per rule label
    pub rules: BTreeMap<&'static str, usize>,
    pub errors: Vec<(PathBuf, String)>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &JobOutcome, destination: &Path) {
        match &outcome.result {
            Ok(written) => {
                self.succeeded += 1;
                if let Some(stage) = written.recovered_by {
                    *self.recovered.entry(stage).or_insert(0) += 1;
                }
                if written.path != destination {
                    self.renamed += 1;
                }
            }
            Err(e) => {
                self.failed += 1;
                self.errors.push((outcome.source_path.clone(), e.to_string()));
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.jobs == 0 {
            100.0
        } else {
            self.succeeded as f64 / self.jobs as f64 * 100.0
        }
    }

    /// Boxed report followed by itemised errors.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        let rule = "═".repeat(62);

        lines.push(format!("╔{}╗", rule));
        lines.push(format!("  {} Timestamp Repair Summary", symbols::CHART));
        lines.push(format!("╠{}╣", rule));
        lines.push(format!("  {} Media files:       {:>8}", symbols::FOLDER, self.media));
        lines.push(format!("  {} Omitted duplicates:{:>8}", symbols::BULLET, self.omitted));
        lines.push(format!("  {} Jobs:              {:>8}", symbols::BULLET, self.jobs));
        lines.push(format!(
            "  {} Succeeded:         {:>8}",
            style(symbols::CHECK).green(),
            self.succeeded
        ));
        lines.push(format!(
            "  {} Failed:            {:>8}",
            style(symbols::CROSS).red(),
            self.failed
        ));
        lines.push(format!("  {} Success rate:      {:>7.1}%", symbols::BULLET, self.success_rate()));

        if !self.rules.is_empty() {
            lines.push(format!("╠{}╣", rule));
            for (label, count) in &self.rules {
                lines.push(format!("  matched by {:<17}{:>8}", label, count));
            }
        }
        if !self.recovered.is_empty() || self.renamed > 0 {
            lines.push(format!("╠{}╣", rule));
            for (stage, count) in &self.recovered {
                lines.push(format!("  recovered by {:<15}{:>8}", stage, count));
            }
            if self.renamed > 0 {
                lines.push(format!("  extensions corrected       {:>8}", self.renamed));
            }
        }

        lines.push(format!("╠{}╣", rule));
        lines.push(format!(
            "  {} Total time:        {:>8}",
            symbols::CLOCK,
            format_duration(self.duration)
        ));
        lines.push(format!("╚{}╝", rule));

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "{} {} file(s) failed:",
                symbols::WARNING,
                style(self.errors.len()).red().bold()
            ));
            for (path, error) in &self.errors {
                lines.push(format!("  {} {}", style(symbols::CROSS).red(), path.display()));
                lines.push(format!("      {}", error));
            }
        }

        lines.join("\n")
    }
}

pub fn print_summary_report(summary: &RunSummary) {
    println!();
    println!("{}", summary.render());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{JobError, WriteFailure};
    use crate::writer::{WriteOutcome, PRISTINE_COPY};

    fn ok(path: &str, recovered_by: Option<&'static str>) -> JobOutcome {
        JobOutcome {
            source_path: PathBuf::from("/in").join(path),
            result: Ok(WriteOutcome {
                path: PathBuf::from("/out").join(path),
                recovered_by,
            }),
        }
    }

    #[test]
    fn test_record_counts() {
        let mut summary = RunSummary {
            jobs: 4,
            ..RunSummary::default()
        };
        summary.record(&ok("a.jpg", None), Path::new("/out/a.jpg"));
        summary.record(&ok("b.jpg", Some(PRISTINE_COPY)), Path::new("/out/b.jpg"));
        summary.record(&ok("c.jpg", None), Path::new("/out/c.png"));
        summary.record(
            &JobOutcome {
                source_path: PathBuf::from("/in/d.jpg"),
                result: Err(JobError::Write(WriteFailure {
                    path: PathBuf::from("/out/d.jpg"),
                    stage: "minimal-write",
                    diagnostic: "Error: broken".to_string(),
                })),
            },
            Path::new("/out/d.jpg"),
        );

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.recovered[PRISTINE_COPY], 1);
        assert_eq!(summary.renamed, 1);
        assert!(summary.has_failures());
        assert!((summary.success_rate() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_render_lists_errors() {
        let summary = RunSummary {
            jobs: 1,
            failed: 1,
            errors: vec![(PathBuf::from("/in/x.jpg"), "copy failed: disk full".to_string())],
            ..RunSummary::default()
        };
        let text = summary.render();
        assert!(text.contains("/in/x.jpg"));
        assert!(text.contains("copy failed: disk full"));
        assert!(text.contains("Timestamp Repair Summary"));
    }

    #[test]
    fn test_empty_run_is_complete() {
        let summary = RunSummary::default();
        assert!(!summary.has_failures());
        assert!((summary.success_rate() - 100.0).abs() < 0.01);
    }
}
