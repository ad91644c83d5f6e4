//! ExifTool boundary
//!
//! The metadata-writing capability is a black-box command: arguments in,
//! combined output plus exit status out. Everything above this module talks
//! to the [`MetadataTool`] trait so the recovery cascade can be driven by a
//! scripted tool in tests.

use crate::common_utils::get_extension_lowercase;
use crate::errors::PreflightError;
use crate::logging::log_external_tool;
use crate::timestamps::TimestampAttributes;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

const QUICKTIME_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "3gp"];
/// No EXIF block; XMP carries the capture date.
const XMP_ONLY_EXTENSIONS: &[&str] = &["gif"];
/// Embedded dates are left alone; only file-level dates are written.
const FILE_ONLY_EXTENSIONS: &[&str] = &["heic", "heif"];

/// Date format used when reading tags back.
pub const READ_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait MetadataTool: Send + Sync {
    fn run(&self, args: &[OsString]) -> io::Result<ToolOutput>;

    /// Read `tags` back as `group:tag → value` (dates formatted with [`READ_DATE_FORMAT`]).
    fn read_dates(&self, path: &Path, tags: &[&str]) -> io::Result<HashMap<String, String>> {
        let mut args: Vec<OsString> = vec!["-j".into(), "-G1".into(), "-d".into(), READ_DATE_FORMAT.into()];
        args.extend(tags.iter().map(|t| OsString::from(format!("-{}", t))));
        args.push(path.as_os_str().to_owned());

        let result = self.run(&args)?;
        if !result.success() {
            return Err(io::Error::other(result.output));
        }

        let parsed: Vec<HashMap<String, serde_json::Value>> =
            serde_json::from_str(&result.output).map_err(io::Error::other)?;
        Ok(parsed
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .filter(|(k, _)| k != "SourceFile")
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect())
    }
}

/// The real `exiftool` binary.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    /// Resolve `program` (a name or path) through `PATH`.
    pub fn locate(program: &Path) -> Result<Self, PreflightError> {
        which::which(program)
            .map(|program| Self { program })
            .map_err(|_| PreflightError::ToolNotFound(program.display().to_string()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl MetadataTool for ExifTool {
    fn run(&self, args: &[OsString]) -> io::Result<ToolOutput> {
        let start = Instant::now();
        let output = Command::new(&self.program).args(args).output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code();

        let printable: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        log_external_tool("exiftool", &printable, &combined, exit_code, start.elapsed());

        Ok(ToolOutput {
            exit_code,
            output: combined,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Tag plans
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: &'static str,
    pub value: String,
}

impl Tag {
    fn new(name: &'static str, value: String) -> Self {
        Self { name, value }
    }

    fn assignment(&self) -> OsString {
        format!("-{}={}", self.name, self.value).into()
    }
}

/// Tags to write for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPlan {
    /// Capture-time tags plus the file-level pair
    pub full: Vec<Tag>,
    /// File-level modify/create attributes only
    pub basic: Vec<Tag>,
    /// QuickTime dates are stored in UTC
    pub quicktime_utc: bool,
}

impl TagPlan {
    /// The file-level pair is set to the create time: the recorded
    /// modification time is usually the export date.
    pub fn for_path(path: &Path, attrs: &TimestampAttributes) -> Self {
        let create = attrs.create_value();
        let modify = attrs.modify_value();

        let mut basic = vec![Tag::new("File:FileModifyDate", create.clone())];
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            basic.push(Tag::new("File:FileCreateDate", create.clone()));
        }

        let ext = get_extension_lowercase(path);
        let mut full = basic.clone();
        let mut quicktime_utc = false;

        if QUICKTIME_EXTENSIONS.contains(&ext.as_str()) {
            quicktime_utc = true;
            full.extend([
                Tag::new("QuickTime:CreateDate", create.clone()),
                Tag::new("QuickTime:ModifyDate", modify.clone()),
                Tag::new("QuickTime:TrackCreateDate", create.clone()),
                Tag::new("QuickTime:TrackModifyDate", modify.clone()),
                Tag::new("QuickTime:MediaCreateDate", create),
                Tag::new("QuickTime:MediaModifyDate", modify),
            ]);
        } else if XMP_ONLY_EXTENSIONS.contains(&ext.as_str()) {
            full.extend([
                Tag::new("XMP-exif:DateTimeOriginal", create.clone()),
                Tag::new("XMP-xmp:CreateDate", create),
                Tag::new("XMP-xmp:ModifyDate", modify),
            ]);
        } else if !FILE_ONLY_EXTENSIONS.contains(&ext.as_str()) {
            full.extend([
                Tag::new("EXIF:DateTimeOriginal", create.clone()),
                Tag::new("EXIF:CreateDate", create),
                Tag::new("EXIF:ModifyDate", modify),
            ]);
        }

        Self {
            full,
            basic,
            quicktime_utc,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════════

fn write_args(path: &Path, tags: &[Tag], quicktime_utc: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-P".into(), "-overwrite_original".into()];
    if quicktime_utc {
        args.push("-api".into());
        args.push("QuickTimeUTC=1".into());
    }
    args.extend(tags.iter().map(Tag::assignment));
    args.push(path.as_os_str().to_owned());
    args
}

pub fn write_tags(
    tool: &dyn MetadataTool,
    path: &Path,
    tags: &[Tag],
    quicktime_utc: bool,
) -> io::Result<ToolOutput> {
    tool.run(&write_args(path, tags, quicktime_utc))
}

/// Remove every writable tag from `path`.
pub fn strip_all(tool: &dyn MetadataTool, path: &Path) -> io::Result<ToolOutput> {
    tool.run(&[
        "-all=".into(),
        "-P".into(),
        "-overwrite_original".into(),
        path.as_os_str().to_owned(),
    ])
}

/// Copy every tag of `from` onto `to`.
pub fn copy_tags(tool: &dyn MetadataTool, from: &Path, to: &Path) -> io::Result<ToolOutput> {
    tool.run(&[
        "-tagsfromfile".into(),
        from.as_os_str().to_owned(),
        "-all:all".into(),
        "-P".into(),
        "-overwrite_original".into(),
        to.as_os_str().to_owned(),
    ])
}

/// Extension implied by an exiftool format-mismatch diagnostic.
///
/// `Error: Not a valid PNG (looks more like a JPEG) - a.png` → `jpg`
pub fn suggested_extension(diagnostic: &str) -> Option<String> {
    const MARKER: &str = "looks more like a ";
    let start = diagnostic.find(MARKER)? + MARKER.len();
    let rest = &diagnostic[start..];
    let format = rest[..rest.find(')')?].trim().to_lowercase();
    if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(match format.as_str() {
        "jpeg" => "jpg".to_string(),
        "tiff" => "tif".to_string(),
        _ => format,
    })
}

pub fn is_extension_mismatch(diagnostic: &str) -> bool {
    suggested_extension(diagnostic).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn os(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    fn attrs() -> TimestampAttributes {
        TimestampAttributes::from_unix(1_453_394_430.0, 1_500_000_000.0).unwrap()
    }

    fn names(tags: &[Tag]) -> Vec<&'static str> {
        tags.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_suggested_extension() {
        assert_eq!(
            suggested_extension("Error: Not a valid PNG (looks more like a JPEG) - a.png").as_deref(),
            Some("jpg")
        );
        assert_eq!(
            suggested_extension("Error: Not a valid JPEG (looks more like a MOV)").as_deref(),
            Some("mov")
        );
        assert_eq!(suggested_extension("Error: File format error"), None);
        assert!(!is_extension_mismatch("Warning: [minor] bad IFD"));
    }

    #[test]
    fn test_plan_for_still_image() {
        let plan = TagPlan::for_path(Path::new("/o/a.JPG"), &attrs());
        assert!(names(&plan.full).contains(&"EXIF:DateTimeOriginal"));
        assert!(names(&plan.basic).iter().all(|n| n.starts_with("File:")));
        assert!(!plan.quicktime_utc);

        let modify = plan.full.iter().find(|t| t.name == "EXIF:ModifyDate").unwrap();
        assert_eq!(modify.value, attrs().modify_value());
        let file = plan.basic.iter().find(|t| t.name == "File:FileModifyDate").unwrap();
        assert_eq!(file.value, attrs().create_value());
    }

    #[test]
    fn test_plan_per_format() {
        let video = TagPlan::for_path(Path::new("/o/a.mov"), &attrs());
        assert!(video.quicktime_utc);
        assert!(names(&video.full).contains(&"QuickTime:CreateDate"));

        let heic = TagPlan::for_path(Path::new("/o/a.heic"), &attrs());
        assert_eq!(heic.full, heic.basic);

        let gif = TagPlan::for_path(Path::new("/o/a.gif"), &attrs());
        assert!(names(&gif.full).contains(&"XMP-exif:DateTimeOriginal"));
    }

    #[test]
    fn test_write_args_layout() {
        let plan = TagPlan::for_path(Path::new("/o/a.mp4"), &attrs());
        let args = write_args(Path::new("/o/a.mp4"), &plan.full, plan.quicktime_utc);
        assert_eq!(args[0], os("-P"));
        assert_eq!(args[1], os("-overwrite_original"));
        assert_eq!(args[2], os("-api"));
        assert_eq!(args.last().unwrap(), os("/o/a.mp4"));
        assert!(args
            .iter()
            .any(|a| a.to_string_lossy().starts_with("-QuickTime:CreateDate=")));
    }

    #[test]
    fn test_read_dates_parses_json() {
        let tool = crate::test_support::ScriptedTool::new(|_| ToolOutput {
            exit_code: Some(0),
            output: r#"[{"SourceFile":"/o/a.jpg",
                         "ExifIFD:DateTimeOriginal":"2016:01:21 16:40:30",
                         "System:FileModifyDate":"2016:01:21 16:40:30"}]"#
                .to_string(),
        });
        let dates = tool
            .read_dates(Path::new("/o/a.jpg"), &["DateTimeOriginal", "FileModifyDate"])
            .unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates["ExifIFD:DateTimeOriginal"], "2016:01:21 16:40:30");
        assert_eq!(tool.calls()[0][0], "-j");
    }

    #[test]
    fn test_locate_missing_tool() {
        let err = ExifTool::locate(Path::new("definitely-not-exiftool-xyz")).unwrap_err();
        assert!(matches!(err, PreflightError::ToolNotFound(_)));
    }
}
