//! Resolved capture/modify timestamps and their exiftool rendering.

use crate::errors::SourceError;
use chrono::{DateTime, Local, TimeZone};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the reference
/// date of the photo-library index.
pub const LIBRARY_EPOCH_OFFSET: f64 = 978_307_200.0;

/// exiftool date format with explicit offset.
const EXIFTOOL_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%:z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampAttributes {
    pub create: DateTime<Local>,
    pub modify: DateTime<Local>,
}

impl TimestampAttributes {
    pub fn new(create: DateTime<Local>, modify: DateTime<Local>) -> Self {
        Self { create, modify }
    }

    /// Both fields from Unix epoch seconds.
    pub fn from_unix(create: f64, modify: f64) -> Result<Self, SourceError> {
        Ok(Self::new(local_from_unix(create)?, local_from_unix(modify)?))
    }

    /// Both fields from library-epoch seconds.
    pub fn from_library_epoch(create: f64, modify: f64) -> Result<Self, SourceError> {
        Self::from_unix(create + LIBRARY_EPOCH_OFFSET, modify + LIBRARY_EPOCH_OFFSET)
    }

    pub fn create_value(&self) -> String {
        format_for_exiftool(&self.create)
    }

    pub fn modify_value(&self) -> String {
        format_for_exiftool(&self.modify)
    }
}

pub fn format_for_exiftool(ts: &DateTime<Local>) -> String {
    ts.format(EXIFTOOL_DATE_FORMAT).to_string()
}

/// Fractional seconds are truncated; exiftool's file dates resolve to the second.
pub fn local_from_unix(seconds: f64) -> Result<DateTime<Local>, SourceError> {
    if !seconds.is_finite() {
        return Err(SourceError::OutOfRange(seconds));
    }
    Local
        .timestamp_opt(seconds.trunc() as i64, 0)
        .single()
        .ok_or(SourceError::OutOfRange(seconds))
}
