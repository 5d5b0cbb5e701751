//! Best-effort thumbnail extraction.

use std::path::{Path, PathBuf};
use tracing::debug;

use vrelay_models::encoding::THUMBNAIL_POSITION_RATIO;

use crate::toolkit::MediaToolkit;

/// Extract a representative frame at 30% of the duration.
///
/// Returns `None` on any failure; a missing thumbnail never fails a delivery.
pub async fn extract_thumbnail<T>(toolkit: &T, video: &Path, output: &Path) -> Option<PathBuf>
where
    T: MediaToolkit + ?Sized,
{
    let duration = match toolkit.probe(video).await {
        Ok(info) => info.duration,
        Err(e) => {
            debug!(video = %video.display(), "Thumbnail probe failed: {}", e);
            return None;
        }
    };

    if let Err(e) = toolkit
        .extract_frame(video, duration * THUMBNAIL_POSITION_RATIO, output)
        .await
    {
        debug!(video = %video.display(), "Thumbnail extraction failed: {}", e);
        return None;
    }

    output.exists().then(|| output.to_path_buf())
}
