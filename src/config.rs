use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extensions accepted for scanning. Checked after lowercasing; `jpg` is
/// normalized to `jpeg` before the lookup, so both spellings land here.
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Files larger than this are filtered out before fingerprinting.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Byte-identical files only, compared by content digest.
    Exact,
    /// Visually similar files, compared by perceptual hash.
    Perceptual,
}

/// Which perceptual hash variant a session uses. Fixed for the whole
/// session; signatures from different variants never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    /// Block-averaged 11x11 luma icon.
    Average,
    /// Row-wise luma gradient bits over a 9x8 downsample.
    Gradient,
}

/// Settings for one scan session. Mode, hash variant and fast-read are
/// resolved into a fingerprint strategy once at session start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: MatchMode,
    pub hash: HashKind,
    /// Hash embedded JPEG preview thumbnails instead of full decodes
    /// where one can be located. Ignored in exact mode.
    pub fast_read: bool,
    /// Optional reference image; when set, candidates are only ever
    /// compared against it.
    pub anchor: Option<PathBuf>,
    pub max_file_size: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Perceptual,
            hash: HashKind::Average,
            fast_read: false,
            anchor: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn is_exact(&self) -> bool {
        self.mode == MatchMode::Exact
    }
}
