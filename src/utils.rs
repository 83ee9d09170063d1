//! Miscellaneous helper utilities.
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, or 0 if the clock is before it.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// List files in `dir` with the given extension, sorted by file name.
///
/// A missing or unreadable directory yields an empty list.
#[must_use]
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    files
}

/// Shorten a secret-bearing string for log output.
#[must_use]
pub fn redact(value: &str) -> String {
    let visible: String = value.chars().take(8).collect();
    if visible.len() < value.len() {
        format!("{}...", visible)
    } else {
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::{files_with_extension, redact};

    #[test]
    fn files_are_filtered_and_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.wvd"), b"b").expect("write");
        std::fs::write(dir.path().join("a.WVD"), b"a").expect("write");
        std::fs::write(dir.path().join("notes.txt"), b"x").expect("write");

        let files = files_with_extension(dir.path(), "wvd");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.WVD", "b.wvd"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(files_with_extension(&dir.path().join("nope"), "wvd").is_empty());
    }

    #[test]
    fn redact_keeps_prefix_only() {
        assert_eq!(redact("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGci...");
        assert_eq!(redact("short"), "short");
    }
}
