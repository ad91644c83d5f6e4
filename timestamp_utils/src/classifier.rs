//! Source tree classification
//!
//! Every regular file under the source root lands in exactly one of three
//! sets: media, sidecar metadata, or unrecognized. Unrecognized extensions
//! are fatal (see [`Classification::ensure_complete`]). Sidecar contents are
//! not opened here.

use crate::common_utils::{get_extension_lowercase, has_extension, is_hidden_file};
use crate::errors::PreflightError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Photo and video types exiftool can write dates into.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "tif", "tiff", // images
    "mp4", "mov", "m4v", "3gp", // QuickTime family
];

/// Structured sidecar format of the cloud-photos export.
pub const SIDECAR_EXTENSIONS: &[&str] = &["json"];

/// Photo-library export companions (edit recipes); carried but never processed.
pub const LIBRARY_COMPANION_EXTENSIONS: &[&str] = &["aae"];

/// A photo/video file under the source root. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Byte size at discovery time (index probes disambiguate by it)
    pub size: u64,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn file_name(&self) -> String {
        crate::common_utils::file_name_lossy(&self.path)
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub media_extensions: &'static [&'static str],
    pub sidecar_extensions: &'static [&'static str],
    /// Recognized but neither media nor sidecar
    pub ignored_extensions: &'static [&'static str],
    pub skip_hidden: bool,
    /// Subtree to leave out, typically a destination nested in the source
    pub exclude: Option<PathBuf>,
}

impl ClassifierConfig {
    /// Cloud-photos export: media plus `.json` sidecars.
    pub fn sidecar_export() -> Self {
        Self {
            media_extensions: MEDIA_EXTENSIONS,
            sidecar_extensions: SIDECAR_EXTENSIONS,
            ignored_extensions: &[],
            skip_hidden: true,
            exclude: None,
        }
    }

    /// Photo-library export: media only, timestamps come from the index.
    pub fn library_export() -> Self {
        Self {
            media_extensions: MEDIA_EXTENSIONS,
            sidecar_extensions: &[],
            ignored_extensions: LIBRARY_COMPANION_EXTENSIONS,
            skip_hidden: true,
            exclude: None,
        }
    }

    pub fn with_exclude(mut self, exclude: Option<PathBuf>) -> Self {
        self.exclude = exclude;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub media: Vec<MediaFile>,
    pub sidecars: Vec<PathBuf>,
    pub unrecognized: Vec<PathBuf>,
    /// Entries the walk could not read; any of them stops the run
    pub unreadable: Vec<PathBuf>,
    /// Lower-cased extension (no dot, empty for none) → count
    pub unknown_extensions: BTreeMap<String, usize>,
    pub ignored: usize,
}

impl Classification {
    /// Fail-fast gate: a partially classified tree is never processed.
    pub fn ensure_complete(self) -> Result<Self, PreflightError> {
        if !self.unreadable.is_empty() {
            return Err(PreflightError::Unreadable(self.unreadable));
        }
        if !self.unknown_extensions.is_empty() {
            return Err(PreflightError::UnknownExtensions(self.unknown_extensions));
        }
        Ok(self)
    }
}

pub fn classify(root: &Path, config: &ClassifierConfig) -> Result<Classification, PreflightError> {
    if !root.is_dir() {
        return Err(PreflightError::SourceNotDirectory(root.to_path_buf()));
    }

    let mut result = Classification::default();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| match &config.exclude {
            Some(excluded) => !e.path().starts_with(excluded),
            None => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!(path = %path.display(), error = %e, "Unreadable directory entry");
                result.unreadable.push(path);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if config.skip_hidden && is_hidden_file(path) {
            tracing::debug!(path = %path.display(), "Skipping hidden file");
            result.ignored += 1;
            continue;
        }

        if has_extension(path, config.media_extensions) {
            match entry.metadata() {
                Ok(metadata) => result.media.push(MediaFile::new(path, metadata.len())),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot stat media file");
                    result.unreadable.push(path.to_path_buf());
                }
            }
        } else if has_extension(path, config.sidecar_extensions) {
            result.sidecars.push(path.to_path_buf());
        } else if has_extension(path, config.ignored_extensions) {
            result.ignored += 1;
        } else {
            *result
                .unknown_extensions
                .entry(get_extension_lowercase(path))
                .or_insert(0) += 1;
            result.unrecognized.push(path.to_path_buf());
        }
    }

    tracing::info!(
        root = %root.display(),
        media = result.media.len(),
        sidecars = result.sidecars.len(),
        unrecognized = result.unrecognized.len(),
        unreadable = result.unreadable.len(),
        ignored = result.ignored,
        "Classified source tree"
    );

    Ok(result)
}
