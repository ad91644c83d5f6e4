//! Metadata sources
//!
//! Two catalogs provide the authoritative timestamp for a media file:
//! - `sidecar`: one `.json` companion file per media item (cloud-photos export)
//! - `library_index`: rows of a photo-library SQLite index
//!
//! Both implement [`SourceCatalog`], so the correlator runs the same rule
//! engine over either.

pub mod library_index;
pub mod sidecar;

use crate::classifier::MediaFile;
use crate::errors::SourceError;
use crate::rules::NameRule;
use crate::timestamps::TimestampAttributes;
use std::path::PathBuf;

pub use library_index::{IndexRecord, LibraryIndex};
pub use sidecar::{SidecarCatalog, SidecarRecord};

/// Read-only authoritative record for one media file.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataSource {
    Sidecar(SidecarRecord),
    Index(IndexRecord),
}

impl MetadataSource {
    /// Sidecars are parsed here, lazily, on the worker that needs them.
    pub fn timestamps(&self) -> Result<TimestampAttributes, SourceError> {
        match self {
            MetadataSource::Sidecar(record) => record.timestamps(),
            MetadataSource::Index(record) => record.timestamps(),
        }
    }

    pub fn id(&self) -> SourceId {
        match self {
            MetadataSource::Sidecar(record) => SourceId::Sidecar(record.path.clone()),
            MetadataSource::Index(record) => SourceId::Index(record.row_id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MetadataSource::Sidecar(record) => record.path.display().to_string(),
            MetadataSource::Index(record) => record.describe(),
        }
    }
}

/// Identity of a record, for telling whether two files claim the same one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Sidecar(PathBuf),
    Index(i64),
}

/// Outcome of looking up one candidate key.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Found(MetadataSource),
    NotFound,
    /// More than one record fits; never resolved by picking one
    Ambiguous(usize),
}

pub trait SourceCatalog: Send + Sync {
    /// Plural noun for reports ("json files", "library records")
    fn label(&self) -> &'static str;

    /// Ordered rule cascade for this catalog; first hit wins.
    fn rules(&self) -> &[NameRule];

    /// Look up the record named `key` for `media`, as produced by `rule`.
    fn probe(&self, media: &MediaFile, key: &str, rule: &NameRule) -> Probe;
}
