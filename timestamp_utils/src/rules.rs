//! File-name rules
//!
//! Export tools rename files inconsistently. Each quirk is one [`NameRule`]:
//! a pattern plus a rewrite that turns a media file name into the key under
//! which its metadata record is filed. Rule tables are plain data; the
//! correlator walks them in order and stops at the first hit.
//!
//! Sidecar keys omit the sidecar extension (the catalog appends it):
//!
//! | rule               | media name             | key                  |
//! |--------------------|------------------------|----------------------|
//! | exact              | `IMG_1.jpg`            | `IMG_1.jpg`          |
//! | stem               | `2012-04-30.jpg`       | `2012-04-30`         |
//! | suffix-reorder     | `20160312(1).jpg`      | `20160312.jpg(1)`    |
//! | duplicate-suffix   | `IMG_6492(1).JPG`      | `IMG_6492.JPG`       |
//! | editor-marker      | `2014-bewerkt.jpg`     | `2014.jpg`           |

use regex::Regex;

/// What a hit means for the media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The record belongs to this file
    Match,
    /// The record belongs to the file this one duplicates
    Omit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Replace the first match
    First,
    /// Replace every match
    All,
}

#[derive(Debug, Clone)]
pub struct NameRule {
    pub label: &'static str,
    pattern: Regex,
    replacement: &'static str,
    mode: RewriteMode,
    pub disposition: Disposition,
    /// Index probes must agree on byte size for this rule
    pub require_size: bool,
    /// A hit on a record another file already matched is a duplicate
    pub yields_to_claimed: bool,
}

impl NameRule {
    pub fn new(
        label: &'static str,
        pattern: &str,
        replacement: &'static str,
        mode: RewriteMode,
        disposition: Disposition,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            label,
            pattern: Regex::new(pattern)?,
            replacement,
            mode,
            disposition,
            require_size: false,
            yields_to_claimed: false,
        })
    }

    pub fn requiring_size(mut self) -> Self {
        self.require_size = true;
        self
    }

    pub fn yielding_to_claimed(mut self) -> Self {
        self.yields_to_claimed = true;
        self
    }

    /// `None` when the pattern does not apply to `name`.
    pub fn rewrite(&self, name: &str) -> Option<String> {
        if !self.pattern.is_match(name) {
            return None;
        }
        let rewritten = match self.mode {
            RewriteMode::First => self.pattern.replace(name, self.replacement),
            RewriteMode::All => self.pattern.replace_all(name, self.replacement),
        };
        (!rewritten.is_empty()).then(|| rewritten.into_owned())
    }
}

/// Cascade for sidecar catalogs.
pub fn sidecar_rules() -> Result<Vec<NameRule>, regex::Error> {
    Ok(vec![
        NameRule::new("exact", r"^(.+)$", "$1", RewriteMode::First, Disposition::Match)?,
        NameRule::new(
            "stem",
            r"^(.+)\.[^.]+$",
            "$1",
            RewriteMode::First,
            Disposition::Match,
        )?,
        NameRule::new(
            "suffix-reorder",
            r"^(.*?)(\(\d+\))\.(.*)$",
            "$1.$3$2",
            RewriteMode::First,
            Disposition::Match,
        )?,
        NameRule::new(
            "duplicate-suffix",
            r"\(\d+\)",
            "",
            RewriteMode::All,
            Disposition::Omit,
        )?,
        NameRule::new(
            "editor-marker",
            r"(?i)-(?:edited|bewerkt)",
            "",
            RewriteMode::All,
            Disposition::Omit,
        )?,
    ])
}

/// Cascade for library-index catalogs. Library exports number clashing
/// names `IMG_1 (1).jpg`; the byte size tells the originals apart. When the
/// size points at a record the un-suffixed file already owns, the suffixed
/// file is a re-export of it.
pub fn library_rules() -> Result<Vec<NameRule>, regex::Error> {
    Ok(vec![
        NameRule::new("exact", r"^(.+)$", "$1", RewriteMode::First, Disposition::Match)?,
        NameRule::new(
            "duplicate-suffix",
            r"\s?\(\d+\)",
            "",
            RewriteMode::All,
            Disposition::Match,
        )?
        .requiring_size()
        .yielding_to_claimed(),
        NameRule::new(
            "editor-marker",
            r"(?i)-(?:edited|bewerkt)",
            "",
            RewriteMode::All,
            Disposition::Omit,
        )?,
    ])
}
