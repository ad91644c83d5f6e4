//! Photo-library index catalog.
//!
//! Reads the asset table of a photo-library SQLite database once, read-only,
//! and keeps it in memory as `lower-cased original file name → records`.
//! Dates are stored as seconds since 2001-01-01 UTC.

use super::{MetadataSource, Probe, SourceCatalog};
use crate::classifier::MediaFile;
use crate::errors::SourceError;
use crate::rules::{library_rules, NameRule};
use crate::timestamps::TimestampAttributes;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Database location inside a `.photoslibrary` bundle.
const BUNDLE_DATABASE: &str = "database/Photos.sqlite";

/// Asset table names across library versions, newest first.
const ASSET_TABLES: &[&str] = &["ZASSET", "ZGENERICASSET"];

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub row_id: i64,
    pub original_name: String,
    pub original_size: Option<u64>,
    /// Library-epoch seconds
    pub created: f64,
    /// Library-epoch seconds
    pub modified: Option<f64>,
}

impl IndexRecord {
    pub fn timestamps(&self) -> Result<TimestampAttributes, SourceError> {
        TimestampAttributes::from_library_epoch(self.created, self.modified.unwrap_or(self.created))
    }

    pub fn describe(&self) -> String {
        match self.original_size {
            Some(size) => format!("asset #{} ({}, {} bytes)", self.row_id, self.original_name, size),
            None => format!("asset #{} ({})", self.row_id, self.original_name),
        }
    }
}

pub struct LibraryIndex {
    path: PathBuf,
    records: HashMap<String, Vec<IndexRecord>>,
    rules: Vec<NameRule>,
}

impl LibraryIndex {
    /// `library` may be the bundle directory or the database file itself.
    pub fn open(library: &Path) -> Result<Self, SourceError> {
        let db_path = if library.is_dir() {
            library.join(BUNDLE_DATABASE)
        } else {
            library.to_path_buf()
        };
        let index_err = |source| SourceError::Index {
            path: db_path.clone(),
            source,
        };

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(index_err)?;

        let table = find_asset_table(&conn)
            .map_err(index_err)?
            .ok_or_else(|| SourceError::IndexSchema(db_path.clone()))?;
        let trashed_filter = if has_column(&conn, table, "ZTRASHEDSTATE").map_err(index_err)? {
            "AND COALESCE(asset.ZTRASHEDSTATE, 0) = 0"
        } else {
            ""
        };

        let sql = format!(
            "SELECT asset.Z_PK, attr.ZORIGINALFILENAME, attr.ZORIGINALFILESIZE,
                    asset.ZDATECREATED, asset.ZMODIFICATIONDATE
             FROM {table} asset
             JOIN ZADDITIONALASSETATTRIBUTES attr ON attr.ZASSET = asset.Z_PK
             WHERE attr.ZORIGINALFILENAME IS NOT NULL
               AND asset.ZDATECREATED IS NOT NULL {trashed_filter}"
        );

        let mut stmt = conn.prepare(&sql).map_err(index_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(IndexRecord {
                    row_id: row.get(0)?,
                    original_name: row.get(1)?,
                    original_size: row.get::<_, Option<i64>>(2)?.map(|s| s.max(0) as u64),
                    created: row.get(3)?,
                    modified: row.get(4)?,
                })
            })
            .map_err(index_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(index_err)?);
        }

        tracing::info!(
            database = %db_path.display(),
            table,
            records = records.len(),
            "Loaded library index"
        );

        Self::from_records(db_path.clone(), records).map_err(|_| SourceError::IndexSchema(db_path))
    }

    pub fn from_records(
        path: PathBuf,
        records: impl IntoIterator<Item = IndexRecord>,
    ) -> Result<Self, regex::Error> {
        let mut by_name: HashMap<String, Vec<IndexRecord>> = HashMap::new();
        for record in records {
            by_name
                .entry(record.original_name.to_lowercase())
                .or_default()
                .push(record);
        }
        Ok(Self {
            path,
            records: by_name,
            rules: library_rules()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn find_asset_table(conn: &Connection) -> rusqlite::Result<Option<&'static str>> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for &table in ASSET_TABLES {
        if stmt.exists([table])? {
            return Ok(Some(table));
        }
    }
    Ok(None)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name?.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl SourceCatalog for LibraryIndex {
    fn label(&self) -> &'static str {
        "library records"
    }

    fn rules(&self) -> &[NameRule] {
        &self.rules
    }

    /// Byte size disambiguates records sharing a name. A single record by
    /// name is accepted without a size match unless the rule requires one.
    fn probe(&self, media: &MediaFile, key: &str, rule: &NameRule) -> Probe {
        let Some(candidates) = self.records.get(&key.to_lowercase()) else {
            return Probe::NotFound;
        };

        let sized: Vec<&IndexRecord> = candidates
            .iter()
            .filter(|r| r.original_size == Some(media.size))
            .collect();

        match (sized.as_slice(), candidates.as_slice()) {
            ([only], _) => Probe::Found(MetadataSource::Index((*only).clone())),
            ([_, _, ..], _) => Probe::Ambiguous(sized.len()),
            ([], [only]) if !rule.require_size => Probe::Found(MetadataSource::Index(only.clone())),
            ([], [_]) => Probe::NotFound,
            ([], _) if rule.require_size => Probe::NotFound,
            ([], many) => Probe::Ambiguous(many.len()),
        }
    }
}
