//! Correlator
//!
//! Maps every media file to exactly one disposition:
//! - `Matched`: one metadata source, found by the first rule that hits
//! - `Omitted`: a re-exported duplicate of a file whose record already exists
//!   (including a suffix-stripped hit on a record another file already owns)
//! - `Missing`: no record, or an ambiguous one
//!
//! The result is built once and read concurrently afterwards.

use crate::classifier::MediaFile;
use crate::common_utils::album_name;
use crate::errors::PreflightError;
use crate::rules::Disposition;
use crate::sources::{MetadataSource, Probe, SourceCatalog, SourceId};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched {
        source: MetadataSource,
        rule: &'static str,
    },
    Omitted {
        duplicate_of: MetadataSource,
        rule: &'static str,
    },
    Missing(MissingReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    NoSource,
    /// Several records fit; an operator has to decide
    Ambiguous { rule: &'static str, candidates: usize },
}

#[derive(Debug, Clone)]
pub struct MatchedFile {
    pub media: MediaFile,
    pub source: MetadataSource,
    pub rule: &'static str,
}

#[derive(Debug, Clone)]
pub struct OmittedFile {
    pub media: MediaFile,
    pub duplicate_of: MetadataSource,
    pub rule: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    pub media: MediaFile,
    pub reason: MissingReason,
}

/// Apply the catalog's rule cascade to one media file.
pub fn resolve(media: &MediaFile, catalog: &dyn SourceCatalog) -> Resolution {
    let name = media.file_name();

    for rule in catalog.rules() {
        let Some(key) = rule.rewrite(&name) else {
            continue;
        };
        match catalog.probe(media, &key, rule) {
            Probe::Found(source) => {
                return match rule.disposition {
                    Disposition::Match => Resolution::Matched {
                        source,
                        rule: rule.label,
                    },
                    Disposition::Omit => Resolution::Omitted {
                        duplicate_of: source,
                        rule: rule.label,
                    },
                };
            }
            Probe::Ambiguous(candidates) => {
                return Resolution::Missing(MissingReason::Ambiguous {
                    rule: rule.label,
                    candidates,
                });
            }
            Probe::NotFound => {}
        }
    }

    Resolution::Missing(MissingReason::NoSource)
}

#[derive(Debug, Clone, Default)]
pub struct Correlation {
    pub matched: Vec<MatchedFile>,
    pub omitted: Vec<OmittedFile>,
    pub missing: Vec<MissingFile>,
    source_label: &'static str,
}

impl Correlation {
    pub fn total(&self) -> usize {
        self.matched.len() + self.omitted.len() + self.missing.len()
    }

    /// Matches per rule label, for the run log.
    pub fn rule_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for m in &self.matched {
            *counts.entry(m.rule).or_insert(0) += 1;
        }
        counts
    }

    pub fn missing_report(&self) -> MissingReport {
        MissingReport::new(self.source_label, &self.missing)
    }

    /// Any missing entry fails the whole run before a file is copied.
    pub fn validate(self) -> Result<Self, PreflightError> {
        if self.missing.is_empty() {
            Ok(self)
        } else {
            Err(PreflightError::MissingMetadata(self.missing_report()))
        }
    }
}

/// A record is matched to at most one file. Hits by rules that yield to
/// claimed records become omissions when the record is already taken; among
/// themselves the first file in walk order keeps the record.
fn settle_claims(resolutions: &mut [Resolution], catalog: &dyn SourceCatalog) {
    let yields = |label: &str| {
        catalog
            .rules()
            .iter()
            .any(|r| r.label == label && r.yields_to_claimed)
    };

    let mut claimed: HashSet<SourceId> = resolutions
        .iter()
        .filter_map(|r| match r {
            Resolution::Matched { source, rule } if !yields(rule) => Some(source.id()),
            _ => None,
        })
        .collect();

    for resolution in resolutions.iter_mut() {
        let Resolution::Matched { source, rule } = resolution else {
            continue;
        };
        if !yields(rule) || claimed.insert(source.id()) {
            continue;
        }
        let omitted = Resolution::Omitted {
            duplicate_of: source.clone(),
            rule: *rule,
        };
        *resolution = omitted;
    }
}

pub fn correlate(media: &[MediaFile], catalog: &dyn SourceCatalog) -> Correlation {
    let mut resolutions: Vec<Resolution> =
        media.par_iter().map(|m| resolve(m, catalog)).collect();
    settle_claims(&mut resolutions, catalog);

    let mut correlation = Correlation {
        source_label: catalog.label(),
        ..Correlation::default()
    };

    for (media, resolution) in media.iter().cloned().zip(resolutions) {
        match resolution {
            Resolution::Matched { source, rule } => {
                correlation.matched.push(MatchedFile { media, source, rule })
            }
            Resolution::Omitted { duplicate_of, rule } => {
                tracing::debug!(
                    path = %media.path.display(),
                    duplicate_of = %duplicate_of.describe(),
                    rule,
                    "Omitting duplicate"
                );
                correlation.omitted.push(OmittedFile {
                    media,
                    duplicate_of,
                    rule,
                })
            }
            Resolution::Missing(reason) => correlation.missing.push(MissingFile { media, reason }),
        }
    }

    tracing::info!(
        matched = correlation.matched.len(),
        omitted = correlation.omitted.len(),
        missing = correlation.missing.len(),
        rules = ?correlation.rule_counts(),
        "Correlation complete"
    );

    correlation
}

// ═══════════════════════════════════════════════════════════════
// Missing report
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AlbumGroup {
    pub directory: PathBuf,
    pub album: String,
    pub files: Vec<MissingFile>,
}

/// Missing entries grouped by parent directory, largest group first.
#[derive(Debug, Clone)]
pub struct MissingReport {
    pub source_label: &'static str,
    pub total: usize,
    pub albums: Vec<AlbumGroup>,
}

impl MissingReport {
    fn new(source_label: &'static str, missing: &[MissingFile]) -> Self {
        let mut groups: HashMap<PathBuf, Vec<MissingFile>> = HashMap::new();
        for entry in missing {
            groups
                .entry(entry.media.directory().to_path_buf())
                .or_default()
                .push(entry.clone());
        }

        let mut albums: Vec<AlbumGroup> = groups
            .into_iter()
            .map(|(directory, mut files)| {
                files.sort_by(|a, b| a.media.path.cmp(&b.media.path));
                AlbumGroup {
                    album: album_name(&files[0].media.path),
                    directory,
                    files,
                }
            })
            .collect();
        albums.sort_by(|a, b| {
            b.files
                .len()
                .cmp(&a.files.len())
                .then_with(|| a.directory.cmp(&b.directory))
        });

        Self {
            source_label,
            total: missing.len(),
            albums,
        }
    }
}

impl fmt::Display for MissingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total missing files {}:", self.total)?;
        writeln!(f, "Albums with missing {}:", self.source_label)?;
        for group in &self.albums {
            writeln!(f, "  {}: {}", group.album, group.files.len())?;
            for entry in &group.files {
                match &entry.reason {
                    MissingReason::NoSource => writeln!(f, "    {}", entry.media.path.display())?,
                    MissingReason::Ambiguous { rule, candidates } => writeln!(
                        f,
                        "    {} (ambiguous: {} records via {})",
                        entry.media.path.display(),
                        candidates,
                        rule
                    )?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
