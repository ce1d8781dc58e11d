use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Per-day folder name, e.g. `2024-03-09`
pub const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Image file stem, e.g. `20240309_141500`
pub const FILE_STEM_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const IMAGE_EXTENSION: &str = "jpg";

/// `<root>/<YYYY-MM-DD>/<YYYYMMDD_HHMMSS>.jpg`
pub fn capture_path(root: &Path, at: NaiveDateTime) -> PathBuf {
    root.join(at.format(DATE_DIR_FORMAT).to_string()).join(format!(
        "{}.{}",
        at.format(FILE_STEM_FORMAT),
        IMAGE_EXTENSION
    ))
}

/// Recover the capture timestamp from a file name produced by [`capture_path`]
pub fn parse_capture_name(name: &str) -> Option<NaiveDateTime> {
    let stem = name.strip_suffix(&format!(".{}", IMAGE_EXTENSION))?;
    NaiveDateTime::parse_from_str(stem, FILE_STEM_FORMAT).ok()
}
