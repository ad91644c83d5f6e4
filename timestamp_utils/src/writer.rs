//! Resilient timestamp writer
//!
//! A direct write is attempted first. When it fails, the ordered recovery
//! stages are consulted; each one decides from the previous diagnostic
//! whether it applies, repairs what it can, and retries. The first success
//! ends the cascade. When every applicable stage has failed, the last
//! diagnostic becomes the job's [`WriteFailure`].
//!
//! | stage                | applies when                    | action                                  |
//! |----------------------|---------------------------------|-----------------------------------------|
//! | `extension-mismatch` | tool names a different format   | rename to the real extension, retry     |
//! | `pristine-copy`      | failure is not about the format | strip a scratch copy, copy tags, retry  |
//! | `minimal-write`      | always                          | write file-level dates only             |
//!
//! A rename target is claimed once per run: two jobs never end up on the
//! same path, and no job lands on another job's destination.

use crate::common_utils::{get_extension_lowercase, with_new_extension};
use crate::errors::WriteFailure;
use crate::exiftool::{
    copy_tags, is_extension_mismatch, strip_all, suggested_extension, write_tags, MetadataTool,
    TagPlan, ToolOutput,
};
use crate::timestamps::TimestampAttributes;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DIRECT_WRITE: &str = "direct-write";
pub const EXTENSION_MISMATCH: &str = "extension-mismatch";
pub const PRISTINE_COPY: &str = "pristine-copy";
pub const MINIMAL_WRITE: &str = "minimal-write";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Where the file ended up; differs from the input after an extension fix
    pub path: PathBuf,
    /// Recovery stage that made the write succeed
    pub recovered_by: Option<&'static str>,
}

/// One failed attempt: which step failed and what the tool said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub stage: &'static str,
    pub diagnostic: String,
}

impl Attempt {
    fn new(stage: &'static str, diagnostic: impl Into<String>) -> Self {
        Self {
            stage,
            diagnostic: diagnostic.into(),
        }
    }
}

/// State shared by the stages of one write.
pub struct WriteContext<'a> {
    pub tool: &'a dyn MetadataTool,
    /// Current location of the file
    pub path: PathBuf,
    pub attrs: TimestampAttributes,
    /// Destinations owned by other jobs; never renamed onto
    pub reserved: &'a HashSet<PathBuf>,
    /// Rename targets already taken during this run
    pub claimed: &'a Mutex<HashSet<PathBuf>>,
}

impl WriteContext<'_> {
    /// Take `target` for this job. Fails when another job owns or already took it.
    fn claim(&self, target: &Path) -> Result<(), String> {
        if self.reserved.contains(target) {
            return Err(format!("{} belongs to another file", target.display()));
        }
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| "rename bookkeeping poisoned".to_string())?;
        if !claimed.insert(target.to_path_buf()) {
            return Err(format!("{} was already taken by another file", target.display()));
        }
        Ok(())
    }

    fn write_full(&self, stage: &'static str) -> Result<(), Attempt> {
        let plan = TagPlan::for_path(&self.path, &self.attrs);
        checked(stage, write_tags(self.tool, &self.path, &plan.full, plan.quicktime_utc))
    }

    fn write_basic(&self, stage: &'static str) -> Result<(), Attempt> {
        let plan = TagPlan::for_path(&self.path, &self.attrs);
        checked(stage, write_tags(self.tool, &self.path, &plan.basic, false))
    }
}

fn checked(stage: &'static str, result: io::Result<ToolOutput>) -> Result<(), Attempt> {
    match result {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => Err(Attempt::new(stage, output.output)),
        Err(e) => Err(Attempt::new(stage, format!("failed to run metadata tool: {}", e))),
    }
}

pub trait RecoveryStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this stage can address `failure`.
    fn applies(&self, failure: &Attempt) -> bool;

    /// Repair and retry. On success the file at `ctx.path` carries the timestamps.
    fn recover(&self, ctx: &mut WriteContext<'_>, failure: &Attempt) -> Result<(), Attempt>;
}

// ═══════════════════════════════════════════════════════════════
// Stages
// ═══════════════════════════════════════════════════════════════

/// Renames a file whose extension lies about its format, then retries once.
pub struct ExtensionMismatchStage;

impl RecoveryStage for ExtensionMismatchStage {
    fn name(&self) -> &'static str {
        EXTENSION_MISMATCH
    }

    fn applies(&self, failure: &Attempt) -> bool {
        is_extension_mismatch(&failure.diagnostic)
    }

    fn recover(&self, ctx: &mut WriteContext<'_>, failure: &Attempt) -> Result<(), Attempt> {
        let extension = suggested_extension(&failure.diagnostic)
            .ok_or_else(|| Attempt::new(EXTENSION_MISMATCH, failure.diagnostic.clone()))?;
        if extension == get_extension_lowercase(&ctx.path) {
            return Err(Attempt::new(
                EXTENSION_MISMATCH,
                format!("extension is already .{}: {}", extension, failure.diagnostic.trim()),
            ));
        }

        let target = with_new_extension(&ctx.path, &extension);
        ctx.claim(&target)
            .map_err(|reason| Attempt::new(EXTENSION_MISMATCH, reason))?;

        fs::rename(&ctx.path, &target).map_err(|e| {
            Attempt::new(
                EXTENSION_MISMATCH,
                format!("rename to {} failed: {}", target.display(), e),
            )
        })?;
        tracing::info!(
            from = %ctx.path.display(),
            to = %target.display(),
            "Corrected file extension"
        );
        ctx.path = target;

        ctx.write_full(EXTENSION_MISMATCH)
    }
}

/// Rebuilds the metadata block: strips a scratch copy, copies every tag of
/// the original onto it, swaps it in and retries.
pub struct PristineCopyStage;

impl PristineCopyStage {
    /// `.IMG_1.pristine.jpg`: hidden files are never classified as media, so
    /// the scratch name cannot be another job's destination. The extension is
    /// kept because exiftool picks the writer by it.
    fn scratch_path(path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!(".{}.pristine.{}", stem, ext.to_string_lossy()),
            None => format!(".{}.pristine", stem),
        };
        path.with_file_name(name)
    }

    fn rebuild(ctx: &WriteContext<'_>, scratch: &Path) -> Result<(), Attempt> {
        checked(PRISTINE_COPY, strip_all(ctx.tool, scratch))?;
        checked(PRISTINE_COPY, copy_tags(ctx.tool, &ctx.path, scratch))?;
        fs::rename(scratch, &ctx.path).map_err(|e| {
            Attempt::new(PRISTINE_COPY, format!("replacing {} failed: {}", ctx.path.display(), e))
        })
    }
}

impl RecoveryStage for PristineCopyStage {
    fn name(&self) -> &'static str {
        PRISTINE_COPY
    }

    fn applies(&self, failure: &Attempt) -> bool {
        !is_extension_mismatch(&failure.diagnostic)
    }

    fn recover(&self, ctx: &mut WriteContext<'_>, _failure: &Attempt) -> Result<(), Attempt> {
        let scratch = Self::scratch_path(&ctx.path);
        if ctx.reserved.contains(&scratch) {
            return Err(Attempt::new(
                PRISTINE_COPY,
                format!("scratch path {} belongs to another file", scratch.display()),
            ));
        }
        fs::copy(&ctx.path, &scratch).map_err(|e| {
            Attempt::new(PRISTINE_COPY, format!("scratch copy {} failed: {}", scratch.display(), e))
        })?;

        if let Err(failure) = Self::rebuild(ctx, &scratch) {
            if let Err(e) = fs::remove_file(&scratch) {
                tracing::warn!(path = %scratch.display(), error = %e, "Failed to remove scratch copy");
            }
            return Err(failure);
        }

        ctx.write_full(PRISTINE_COPY)
    }
}

/// Last resort: only the file-level modify/create dates.
pub struct MinimalWriteStage;

impl RecoveryStage for MinimalWriteStage {
    fn name(&self) -> &'static str {
        MINIMAL_WRITE
    }

    fn applies(&self, _failure: &Attempt) -> bool {
        true
    }

    fn recover(&self, ctx: &mut WriteContext<'_>, _failure: &Attempt) -> Result<(), Attempt> {
        ctx.write_basic(MINIMAL_WRITE)
    }
}

pub fn default_stages() -> Vec<Box<dyn RecoveryStage>> {
    vec![
        Box::new(ExtensionMismatchStage),
        Box::new(PristineCopyStage),
        Box::new(MinimalWriteStage),
    ]
}

// ═══════════════════════════════════════════════════════════════
// Writer
// ═══════════════════════════════════════════════════════════════

pub struct Writer {
    tool: Arc<dyn MetadataTool>,
    stages: Vec<Box<dyn RecoveryStage>>,
    reserved: HashSet<PathBuf>,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl Writer {
    pub fn new(tool: Arc<dyn MetadataTool>) -> Self {
        Self {
            tool,
            stages: default_stages(),
            reserved: HashSet::new(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Paths the extension fix must not rename onto.
    pub fn with_reserved_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.reserved = paths.into_iter().collect();
        self
    }

    pub fn with_stages(mut self, stages: Vec<Box<dyn RecoveryStage>>) -> Self {
        self.stages = stages;
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn tool(&self) -> &dyn MetadataTool {
        self.tool.as_ref()
    }

    pub fn write(
        &self,
        path: &Path,
        attrs: &TimestampAttributes,
    ) -> Result<WriteOutcome, WriteFailure> {
        let mut ctx = WriteContext {
            tool: self.tool.as_ref(),
            path: path.to_path_buf(),
            attrs: *attrs,
            reserved: &self.reserved,
            claimed: &self.claimed,
        };

        let mut last = match ctx.write_full(DIRECT_WRITE) {
            Ok(()) => {
                return Ok(WriteOutcome {
                    path: ctx.path,
                    recovered_by: None,
                })
            }
            Err(failure) => failure,
        };

        for stage in &self.stages {
            if !stage.applies(&last) {
                tracing::debug!(path = %ctx.path.display(), stage = stage.name(), "Recovery stage skipped");
                continue;
            }
            tracing::debug!(
                path = %ctx.path.display(),
                stage = stage.name(),
                after = last.stage,
                "Attempting recovery"
            );
            match stage.recover(&mut ctx, &last) {
                Ok(()) => {
                    tracing::info!(path = %ctx.path.display(), stage = stage.name(), "Write recovered");
                    return Ok(WriteOutcome {
                        path: ctx.path,
                        recovered_by: Some(stage.name()),
                    });
                }
                Err(failure) => last = failure,
            }
        }

        Err(WriteFailure {
            path: ctx.path,
            stage: last.stage,
            diagnostic: last.diagnostic,
        })
    }
}
