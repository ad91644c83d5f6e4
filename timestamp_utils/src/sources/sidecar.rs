//! Sidecar catalog for cloud-photos exports.
//!
//! Each media file `IMG_1.jpg` normally has a companion `IMG_1.jpg.json`:
//!
//! ```json
//! {
//!   "title": "IMG_1.jpg",
//!   "photoTakenTime":   { "timestamp": "1453394430", "formatted": "..." },
//!   "modificationTime": { "timestamp": "1453400000", "formatted": "..." }
//! }
//! ```

use super::{MetadataSource, Probe, SourceCatalog};
use crate::classifier::MediaFile;
use crate::errors::SourceError;
use crate::rules::{sidecar_rules, NameRule};
use crate::timestamps::TimestampAttributes;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarRecord {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarPayload {
    photo_taken_time: Option<TimeField>,
    modification_time: Option<TimeField>,
}

#[derive(Debug, Deserialize)]
struct TimeField {
    timestamp: EpochValue,
}

/// The export writes epoch seconds as strings; accept bare numbers too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpochValue {
    Text(String),
    Number(f64),
}

impl EpochValue {
    fn seconds(&self) -> Option<f64> {
        match self {
            EpochValue::Text(s) => s.trim().parse().ok(),
            EpochValue::Number(n) => Some(*n),
        }
    }
}

impl SidecarRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create time from `photoTakenTime`; modify time from
    /// `modificationTime`, falling back to the create time.
    pub fn timestamps(&self) -> Result<TimestampAttributes, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| {
            SourceError::SidecarRead {
                path: self.path.clone(),
                source,
            }
        })?;
        self.parse(&text)
    }

    fn parse(&self, text: &str) -> Result<TimestampAttributes, SourceError> {
        let payload: SidecarPayload =
            serde_json::from_str(text).map_err(|source| SourceError::SidecarParse {
                path: self.path.clone(),
                source,
            })?;

        let create = payload
            .photo_taken_time
            .as_ref()
            .and_then(|f| f.timestamp.seconds())
            .ok_or_else(|| SourceError::MissingField {
                path: self.path.clone(),
                field: "photoTakenTime.timestamp",
            })?;
        let modify = payload
            .modification_time
            .as_ref()
            .and_then(|f| f.timestamp.seconds())
            .unwrap_or(create);

        TimestampAttributes::from_unix(create, modify)
    }
}

pub struct SidecarCatalog {
    sidecars: HashSet<PathBuf>,
    /// Case-folded file name → sidecar, for `IMG_1.jpg.JSON` and friends
    folded: HashMap<PathBuf, PathBuf>,
    extension: &'static str,
    rules: Vec<NameRule>,
}

/// Same directory, lower-cased file name.
fn fold(path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(name.to_string_lossy().to_lowercase()),
        None => path.to_path_buf(),
    }
}

impl SidecarCatalog {
    pub fn new(sidecars: impl IntoIterator<Item = PathBuf>) -> Result<Self, regex::Error> {
        let sidecars: HashSet<PathBuf> = sidecars.into_iter().collect();
        let mut folded = HashMap::new();
        for path in &sidecars {
            folded
                .entry(fold(path))
                .and_modify(|kept: &mut PathBuf| {
                    if *path < *kept {
                        *kept = path.clone();
                    }
                })
                .or_insert_with(|| path.clone());
        }
        Ok(Self {
            sidecars,
            folded,
            extension: "json",
            rules: sidecar_rules()?,
        })
    }

    pub fn len(&self) -> usize {
        self.sidecars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sidecars.is_empty()
    }

    fn candidate(&self, directory: &Path, key: &str) -> PathBuf {
        directory.join(format!("{}.{}", key, self.extension))
    }
}

impl SourceCatalog for SidecarCatalog {
    fn label(&self) -> &'static str {
        "json files"
    }

    fn rules(&self) -> &[NameRule] {
        &self.rules
    }

    fn probe(&self, media: &MediaFile, key: &str, _rule: &NameRule) -> Probe {
        let candidate = self.candidate(media.directory(), key);
        if self.sidecars.contains(&candidate) {
            return Probe::Found(MetadataSource::Sidecar(SidecarRecord::new(candidate)));
        }
        match self.folded.get(&fold(&candidate)) {
            Some(path) => Probe::Found(MetadataSource::Sidecar(SidecarRecord::new(path.clone()))),
            None => Probe::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_timestamps() {
        let record = SidecarRecord::new("/x/a.jpg.json");
        let attrs = record
            .parse(
                r#"{"title":"a.jpg",
                    "photoTakenTime":{"timestamp":"1453394430","formatted":"21 jan. 2016"},
                    "modificationTime":{"timestamp":"1500000000"}}"#,
            )
            .unwrap();
        assert_eq!(attrs.create.with_timezone(&Utc).timestamp(), 1_453_394_430);
        assert_eq!(attrs.modify.with_timezone(&Utc).timestamp(), 1_500_000_000);
    }

    #[test]
    fn test_parse_numeric_and_fallback() {
        let record = SidecarRecord::new("/x/a.jpg.json");
        let attrs = record
            .parse(r#"{"photoTakenTime":{"timestamp":1453394430}}"#)
            .unwrap();
        assert_eq!(attrs.create, attrs.modify);
    }

    #[test]
    fn test_parse_errors() {
        let record = SidecarRecord::new("/x/a.jpg.json");
        assert!(matches!(
            record.parse("{not json"),
            Err(SourceError::SidecarParse { .. })
        ));
        assert!(matches!(
            record.parse(r#"{"photoTakenTime":{"timestamp":"soon"}}"#),
            Err(SourceError::MissingField { .. })
        ));
    }

    #[test]
    fn test_timestamps_reads_file_lazily() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.jpg.json");
        let record = SidecarRecord::new(&path);
        assert!(matches!(
            record.timestamps(),
            Err(SourceError::SidecarRead { .. })
        ));

        fs::write(&path, r#"{"photoTakenTime":{"timestamp":"0"}}"#).unwrap();
        assert_eq!(record.timestamps().unwrap().create.timestamp(), 0);
    }

    #[test]
    fn test_probe_same_directory_only() {
        let catalog = SidecarCatalog::new(vec![PathBuf::from("/t/A/IMG_1.jpg.json")]).unwrap();
        let rule = &catalog.rules()[0];

        let here = MediaFile::new("/t/A/IMG_1.jpg", 1);
        let elsewhere = MediaFile::new("/t/B/IMG_1.jpg", 1);
        assert!(matches!(
            catalog.probe(&here, "IMG_1.jpg", rule),
            Probe::Found(_)
        ));
        assert_eq!(catalog.probe(&elsewhere, "IMG_1.jpg", rule), Probe::NotFound);
    }

    #[test]
    fn test_probe_ignores_sidecar_case() {
        let catalog = SidecarCatalog::new(vec![
            PathBuf::from("/t/A/IMG_1.jpg.JSON"),
            PathBuf::from("/t/A/IMG_2.JPG.json"),
            PathBuf::from("/t/A/img_2.jpg.json"),
        ])
        .unwrap();
        let rule = &catalog.rules()[0];

        let upper = MediaFile::new("/t/A/IMG_1.jpg", 1);
        match catalog.probe(&upper, "IMG_1.jpg", rule) {
            Probe::Found(source) => assert_eq!(source.describe(), "/t/A/IMG_1.jpg.JSON"),
            other => panic!("unexpected {:?}", other),
        }

        // An exact-case sidecar wins over a case-folded one.
        let lower = MediaFile::new("/t/A/img_2.jpg", 1);
        match catalog.probe(&lower, "img_2.jpg", rule) {
            Probe::Found(source) => assert_eq!(source.describe(), "/t/A/img_2.jpg.json"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
