//! Size thresholds and encoding constants.

use serde::{Deserialize, Serialize};

/// One mebibyte.
pub const MB: u64 = 1024 * 1024;

/// Files above this size are split before delivery.
pub const DEFAULT_SPLIT_THRESHOLD_BYTES: u64 = 50 * MB;
/// Target size of each split part; kept below the threshold for container overhead.
pub const DEFAULT_PART_SIZE_BYTES: u64 = 43 * MB;

/// Re-encode fallback settings
pub const REENCODE_VIDEO_CODEC: &str = "libx264";
pub const REENCODE_PRESET: &str = "ultrafast";
pub const REENCODE_CRF: u8 = 28;
pub const REENCODE_AUDIO_CODEC: &str = "aac";
pub const REENCODE_AUDIO_BITRATE: &str = "128k";

/// Thumbnails are taken at this fraction of the duration.
pub const THUMBNAIL_POSITION_RATIO: f64 = 0.3;
/// JPEG quality passed to `-q:v`
pub const THUMBNAIL_QUALITY: u8 = 2;

/// Split threshold and part size, validated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeLimits {
    pub split_threshold_bytes: u64,
    pub part_size_bytes: u64,
}

impl SizeLimits {
    /// Returns `None` unless `0 < part_size < split_threshold`.
    pub fn new(split_threshold_bytes: u64, part_size_bytes: u64) -> Option<Self> {
        if part_size_bytes == 0 || part_size_bytes >= split_threshold_bytes {
            return None;
        }
        Some(Self {
            split_threshold_bytes,
            part_size_bytes,
        })
    }

    pub fn needs_split(&self, size_bytes: u64) -> bool {
        size_bytes > self.split_threshold_bytes
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            split_threshold_bytes: DEFAULT_SPLIT_THRESHOLD_BYTES,
            part_size_bytes: DEFAULT_PART_SIZE_BYTES,
        }
    }
}
