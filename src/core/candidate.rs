use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SUPPORTED_FORMATS;
use crate::core::fingerprint::Fingerprint;
use crate::source::FileHandle;

/// One file under consideration for the session. Created during
/// enumeration, fingerprinted at most once, assigned to at most one
/// cluster; never otherwise mutated.
#[derive(Debug)]
pub struct CandidateFile {
    pub handle: FileHandle,
    /// Lowercase extension with `jpg` normalized to `jpeg`; empty when
    /// the file name has no dot.
    pub ext: String,
    pub valid: bool,
    /// Known after a full decode, or from the SOF0 marker on the JPEG
    /// fast path. Unknown in exact mode.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fingerprint: Option<Fingerprint>,
    /// Index of the cluster this file joined, set exactly once.
    pub cluster: Option<usize>,
    /// Byte range of an embedded preview located by the fast path,
    /// surfaced so external renderers can reuse it.
    pub thumb_range: Option<(usize, usize)>,
}

impl CandidateFile {
    pub fn new(handle: FileHandle, max_file_size: u64) -> Self {
        let ext = extension_of(&handle.rel_path);
        let valid = SUPPORTED_FORMATS.contains(&ext.as_str()) && handle.size <= max_file_size;
        Self {
            handle,
            ext,
            valid,
            width: None,
            height: None,
            fingerprint: None,
            cluster: None,
            thumb_range: None,
        }
    }

    pub fn is_jpeg(&self) -> bool {
        self.ext == "jpeg"
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    pub fn file_ref(&self) -> FileRef {
        FileRef {
            rel_path: self.handle.rel_path.clone(),
            size: self.handle.size,
            modified: self.handle.modified,
            width: self.width,
            height: self.height,
            thumb_range: self.thumb_range,
        }
    }
}

fn extension_of(rel_path: &str) -> String {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    match name.rfind('.') {
        Some(i) => {
            let ext = name[i + 1..].to_lowercase();
            if ext == "jpg" {
                "jpeg".to_string()
            } else {
                ext
            }
        }
        None => String::new(),
    }
}

/// Lightweight view of a candidate for session snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct FileRef {
    pub rel_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumb_range: Option<(usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    fn test_handle(rel_path: &str, size: u64) -> FileHandle {
        FileHandle {
            path: PathBuf::from(rel_path),
            rel_path: rel_path.to_string(),
            size,
            modified: DateTime::<Utc>::from(UNIX_EPOCH),
        }
    }

    #[test]
    fn extension_is_normalized() {
        let c = CandidateFile::new(test_handle("photos/IMG_0001.JPG", 100), 1000);
        assert_eq!(c.ext, "jpeg");
        assert!(c.is_jpeg());
        assert!(c.valid);
    }

    #[test]
    fn unsupported_or_oversize_files_are_invalid() {
        let c = CandidateFile::new(test_handle("notes.txt", 100), 1000);
        assert!(!c.valid);

        let c = CandidateFile::new(test_handle("big.png", 2000), 1000);
        assert!(!c.valid);

        let c = CandidateFile::new(test_handle("noext", 100), 1000);
        assert_eq!(c.ext, "");
        assert!(!c.valid);
    }

    #[test]
    fn dimensions_require_both_axes() {
        let mut c = CandidateFile::new(test_handle("a.png", 100), 1000);
        assert_eq!(c.dimensions(), None);
        c.width = Some(640);
        assert_eq!(c.dimensions(), None);
        c.height = Some(480);
        assert_eq!(c.dimensions(), Some((640, 480)));
    }
}
