//! Common Utilities Module
//!
//! 通用路径与文件工具，供分类器、执行引擎和写入器共用：
//! - 扩展名处理（不区分大小写）
//! - 将源路径映射到目标目录树
//! - 带上下文错误信息的文件复制

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// ═══════════════════════════════════════════════════════════════
// Extensions
// ═══════════════════════════════════════════════════════════════

/// Lower-cased extension of `path`, or an empty string when it has none.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use timestamp_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("IMG_0001.JPG")), "jpg");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Case-insensitive membership test against a list of extensions (no dots).
///
/// # Examples
/// ```
/// use std::path::Path;
/// use timestamp_utils::common_utils::has_extension;
///
/// assert!(has_extension(Path::new("clip.MOV"), &["mov", "mp4"]));
/// assert!(!has_extension(Path::new("clip.avi"), &["mov", "mp4"]));
/// ```
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

/// 隐藏文件（如 `.DS_Store`）
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// File name as a `String` (lossy), empty when the path has none.
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Same directory and stem, new extension.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use timestamp_utils::common_utils::with_new_extension;
///
/// assert_eq!(
///     with_new_extension(Path::new("/out/a/photo.png"), "jpg"),
///     PathBuf::from("/out/a/photo.jpg")
/// );
/// ```
pub fn with_new_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

// ═══════════════════════════════════════════════════════════════
// Paths
// ═══════════════════════════════════════════════════════════════

/// Path of `path` relative to `base`; the original path when it is not below `base`.
pub fn compute_relative_path(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Re-root `path` from `source_root` under `destination_root`.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use timestamp_utils::common_utils::reroot;
///
/// let dst = reroot(
///     Path::new("/takeout/Album 1/IMG_1.jpg"),
///     Path::new("/takeout"),
///     Path::new("/fixed"),
/// );
/// assert_eq!(dst, PathBuf::from("/fixed/Album 1/IMG_1.jpg"));
/// ```
pub fn reroot(path: &Path, source_root: &Path, destination_root: &Path) -> PathBuf {
    destination_root.join(compute_relative_path(path, source_root))
}

/// Name of the immediate parent directory ("album"), or `"."` at the root.
pub fn album_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

// ═══════════════════════════════════════════════════════════════
// File operations
// ═══════════════════════════════════════════════════════════════

pub fn ensure_parent_dir_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Copy `source` over `dest`, creating parent directories first.
/// Returns the number of bytes copied.
pub fn copy_file_with_context(source: &Path, dest: &Path) -> Result<u64> {
    ensure_parent_dir_exists(dest)?;
    std::fs::copy(source, dest).with_context(|| {
        format!(
            "Failed to copy file from {} to {}",
            source.display(),
            dest.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extension_helpers() {
        assert_eq!(get_extension_lowercase(Path::new("a/b/IMG.HeIc")), "heic");
        assert!(has_extension(Path::new("x.JSON"), &["json"]));
        assert!(is_hidden_file(Path::new("/a/.DS_Store")));
        assert!(!is_hidden_file(Path::new("/a/b.jpg")));
    }

    #[test]
    fn test_album_name() {
        assert_eq!(album_name(Path::new("/t/Holiday 2012/a.jpg")), "Holiday 2012");
        assert_eq!(album_name(Path::new("a.jpg")), ".");
    }

    #[test]
    fn test_copy_creates_parents_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.jpg");
        fs::write(&src, b"first").unwrap();
        let dst = temp.path().join("out/nested/src.jpg");

        copy_file_with_context(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"first");

        fs::write(&src, b"second").unwrap();
        copy_file_with_context(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"second");
    }
}
