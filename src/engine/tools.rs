//! Path, filter, and clock utilities

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Windows device names that cannot be used as file names.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Path as a string with forward slashes (portable across platforms).
pub fn path_to_db_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lowercase extension without the leading dot; empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// File name without its extension.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Normalize a user-supplied extension list: trimmed, lowercased, leading dot dropped.
pub fn normalize_extensions<I, S>(exts: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Include/exclude extension filter. An empty include set admits everything.
#[derive(Clone, Debug, Default)]
pub struct ExtensionFilter {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: normalize_extensions(include),
            exclude: normalize_extensions(exclude),
        }
    }

    pub fn accepts(&self, ext: &str) -> bool {
        if !self.include.is_empty() && !self.include.contains(ext) {
            return false;
        }
        !self.exclude.contains(ext)
    }
}

/// Make a subtree name safe to use inside a Windows file name.
pub fn sanitize_for_filename(name: &str) -> String {
    let mut s: String = name
        .trim()
        .chars()
        .map(|c| {
            if c == ' ' || ILLEGAL_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let base = Path::new(&s)
        .file_stem()
        .map(|b| b.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    if RESERVED_NAMES.contains(&base.as_str()) {
        s.push_str("_dir");
    }
    s
}

/// Output path for one subtree: `<out_dir>/<out_stem>_<sanitized>.csv`.
pub fn subtree_output_path(base_out: &Path, subtree: &str) -> PathBuf {
    let dir = base_out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let stem = base_out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    dir.join(format!("{stem}_{}.csv", sanitize_for_filename(subtree)))
}

/// Modification time in nanoseconds since epoch; negative before the epoch.
pub fn mtime_ns(modified: SystemTime) -> i64 {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        Err(e) => -(e.duration().as_nanos() as i64),
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Size in kilobytes and megabytes.
pub fn bytes_to_kb_mb(size: u64) -> (f64, f64) {
    let size = size as f64;
    (size / 1024.0, size / (1024.0 * 1024.0))
}
