//! Bitrate-based splitting.
//!
//! The average byte rate of the source decides how many seconds fit into one
//! part. Segments are cut in order with a stream copy; if the copy pass
//! yields nothing at all, one re-encode pass is made instead. Within a pass
//! the first segment that comes out missing or empty ends the pass, and the
//! trailing content is dropped. The caller's stop check is consulted before
//! every cut, so a cancelled job never starts another ffmpeg process.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use vrelay_models::Part;

use crate::error::{MediaError, MediaResult};
use crate::toolkit::{CutMode, MediaToolkit};

/// Remaining durations below this are float noise, not a segment.
const MIN_SEGMENT_SECS: f64 = 1e-6;

/// One planned cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlan {
    pub start_secs: f64,
    pub length_secs: f64,
}

/// Plan the cuts for a file of `size_bytes` lasting `duration_secs`.
///
/// Every segment lasts `target_part_bytes / (size_bytes / duration_secs)`
/// seconds except the last, which covers what remains.
pub fn plan_segments(
    size_bytes: u64,
    duration_secs: f64,
    target_part_bytes: u64,
) -> MediaResult<Vec<SegmentPlan>> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "cannot split a file with duration {duration_secs}"
        )));
    }
    if size_bytes == 0 {
        return Err(MediaError::InvalidVideo("cannot split an empty file".to_string()));
    }
    if target_part_bytes == 0 {
        return Err(MediaError::split_failed("target part size must be positive"));
    }

    let bytes_per_sec = size_bytes as f64 / duration_secs;
    let target_secs = target_part_bytes as f64 / bytes_per_sec;

    let mut plan = Vec::new();
    let mut index = 0u32;
    loop {
        let start_secs = f64::from(index) * target_secs;
        let remaining = duration_secs - start_secs;
        if remaining <= MIN_SEGMENT_SECS {
            break;
        }
        plan.push(SegmentPlan {
            start_secs,
            length_secs: target_secs.min(remaining),
        });
        index += 1;
    }

    Ok(plan)
}

/// Split `input` into parts of at most roughly `target_part_bytes`, written
/// to `output_dir` as `part1.mp4`, `part2.mp4`, ...
///
/// Fails with [`MediaError::SplitFailed`] when neither strategy produced a part,
/// and with [`MediaError::Cancelled`] as soon as `should_stop` returns true.
pub async fn split_media<T>(
    toolkit: &T,
    input: &Path,
    output_dir: &Path,
    target_part_bytes: u64,
    should_stop: &(dyn Fn() -> bool + Sync),
) -> MediaResult<Vec<Part>>
where
    T: MediaToolkit + ?Sized,
{
    tokio::fs::create_dir_all(output_dir).await?;

    let info = toolkit.probe(input).await?;
    let (size_bytes, duration_secs) = (info.size, info.duration);
    let plan = plan_segments(size_bytes, duration_secs, target_part_bytes)?;

    info!(
        input = %input.display(),
        size_bytes,
        duration_secs,
        segments = plan.len(),
        "Splitting media"
    );

    let mut paths = cut_all(toolkit, input, output_dir, &plan, CutMode::Copy, should_stop).await?;
    if paths.is_empty() {
        warn!(input = %input.display(), "Stream copy produced no parts, re-encoding");
        paths =
            cut_all(toolkit, input, output_dir, &plan, CutMode::Reencode, should_stop).await?;
    }

    if paths.is_empty() {
        return Err(MediaError::split_failed(
            "both stream copy and re-encode produced no parts",
        ));
    }

    if paths.len() < plan.len() {
        warn!(
            produced = paths.len(),
            planned = plan.len(),
            "Split stopped early; trailing content dropped"
        );
    }

    let total_parts = paths.len();
    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| Part {
            path,
            sequence_index: i + 1,
            total_parts,
        })
        .collect())
}

async fn cut_all<T>(
    toolkit: &T,
    input: &Path,
    output_dir: &Path,
    plan: &[SegmentPlan],
    mode: CutMode,
    should_stop: &(dyn Fn() -> bool + Sync),
) -> MediaResult<Vec<PathBuf>>
where
    T: MediaToolkit + ?Sized,
{
    let mut accepted = Vec::with_capacity(plan.len());

    for (i, segment) in plan.iter().enumerate() {
        if should_stop() {
            info!(segment = i + 1, ?mode, "Split stopped before cut");
            return Err(MediaError::Cancelled);
        }

        let out = output_dir.join(format!("part{}.mp4", i + 1));

        if let Err(e) = toolkit
            .cut_segment(input, segment.start_secs, segment.length_secs, mode, &out)
            .await
        {
            warn!(segment = i + 1, ?mode, "Segment cut failed: {}", e);
        }

        if !is_non_empty_file(&out).await {
            break;
        }
        accepted.push(out);
    }

    Ok(accepted)
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::probe::MediaInfo;
    use vrelay_models::MB;

    /// Writes a small file per cut; fails copy cuts from `copy_fails_from` on.
    struct FakeToolkit {
        duration: f64,
        copy_fails_from: Option<usize>,
        reencode_fails_from: Option<usize>,
        calls: Mutex<Vec<(CutMode, f64, f64)>>,
    }

    impl FakeToolkit {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                copy_fails_from: None,
                reencode_fails_from: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self, mode: CutMode) -> Vec<(f64, f64)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _, _)| *m == mode)
                .map(|(_, s, l)| (*s, *l))
                .collect()
        }
    }

    #[async_trait]
    impl MediaToolkit for FakeToolkit {
        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            Ok(MediaInfo {
                duration: self.duration,
                size: std::fs::metadata(path)?.len(),
            })
        }

        async fn extract_frame(&self, _: &Path, _: f64, _: &Path) -> MediaResult<()> {
            Ok(())
        }

        async fn cut_segment(
            &self,
            _input: &Path,
            start_secs: f64,
            length_secs: f64,
            mode: CutMode,
            output: &Path,
        ) -> MediaResult<()> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((mode, start_secs, length_secs));
                calls.iter().filter(|(m, _, _)| *m == mode).count()
            };
            let fails_from = match mode {
                CutMode::Copy => self.copy_fails_from,
                CutMode::Reencode => self.reencode_fails_from,
            };
            if fails_from.is_some_and(|n| index >= n) {
                // ffmpeg sometimes leaves an empty file behind
                std::fs::write(output, b"")?;
                return Err(MediaError::ffmpeg_failed("cut failed", None, Some(1)));
            }
            std::fs::write(output, b"segment")?;
            Ok(())
        }
    }

    fn source_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("source.mp4");
        std::fs::write(&path, b"placeholder").unwrap();
        path
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn test_plan_constant_bitrate() {
        // 1 MB/s with a 45 MB target: 45 s segments
        let plan = plan_segments(600 * MB, 600.0, 45 * MB).unwrap();
        assert_eq!(plan.len(), 14);
        for seg in &plan[..13] {
            assert!((seg.length_secs - 45.0).abs() < 1e-9);
        }
        assert!((plan[13].start_secs - 585.0).abs() < 1e-9);
        assert!((plan[13].length_secs - 15.0).abs() < 1e-9);

        // 0.2 MB/s with the same target: 225 s segments
        let plan = plan_segments(120 * MB, 600.0, 45 * MB).unwrap();
        assert_eq!(plan.len(), 3);
        assert!((plan[2].length_secs - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_count_is_ceil_of_size_over_target() {
        for (size, target) in [(100u64, 30u64), (90, 30), (91, 30), (31, 30)] {
            let plan = plan_segments(size * MB, 1234.5, target * MB).unwrap();
            assert_eq!(plan.len() as u64, size.div_ceil(target), "size={size} target={target}");
        }
    }

    #[test]
    fn test_plan_segments_are_contiguous() {
        let plan = plan_segments(77 * MB, 321.0, 10 * MB).unwrap();
        let mut cursor = 0.0;
        for seg in &plan {
            assert!((seg.start_secs - cursor).abs() < 1e-6);
            cursor = seg.start_secs + seg.length_secs;
        }
        assert!((cursor - 321.0).abs() < 1e-6);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        assert!(plan_segments(10, 0.0, 5).is_err());
        assert!(plan_segments(10, f64::NAN, 5).is_err());
        assert!(plan_segments(0, 10.0, 5).is_err());
        assert!(plan_segments(10, 10.0, 0).is_err());
    }

    #[tokio::test]
    async fn test_split_uses_stream_copy_when_it_works() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let toolkit = FakeToolkit::new(600.0);
        // 11-byte source over 600 s; a 3-byte target gives ceil(11/3) = 4 parts
        let parts = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &never)
            .await
            .unwrap();

        assert_eq!(parts.len(), 4);
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 4);
        assert!(toolkit.calls(CutMode::Reencode).is_empty());
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.sequence_index, i + 1);
            assert_eq!(part.total_parts, 4);
            assert!(part.path.ends_with(format!("part{}.mp4", i + 1)));
        }
    }

    #[tokio::test]
    async fn test_split_falls_back_to_reencode_exactly_once() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let mut toolkit = FakeToolkit::new(600.0);
        toolkit.copy_fails_from = Some(1);

        let parts = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &never)
            .await
            .unwrap();

        // the copy pass stops at its first rejected segment
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 1);
        assert_eq!(toolkit.calls(CutMode::Reencode).len(), 4);
        assert_eq!(parts.len(), 4);
    }

    #[tokio::test]
    async fn test_split_truncates_at_first_failed_segment() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let mut toolkit = FakeToolkit::new(600.0);
        toolkit.copy_fails_from = Some(3);

        let parts = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &never)
            .await
            .unwrap();

        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.total_parts == 2));
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 3);
        assert!(toolkit.calls(CutMode::Reencode).is_empty());
    }

    #[tokio::test]
    async fn test_split_fails_when_both_strategies_produce_nothing() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let mut toolkit = FakeToolkit::new(600.0);
        toolkit.copy_fails_from = Some(1);
        toolkit.reencode_fails_from = Some(1);

        let err = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &never)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::SplitFailed(_)));
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 1);
        assert_eq!(toolkit.calls(CutMode::Reencode).len(), 1);
    }

    #[tokio::test]
    async fn test_split_stops_cutting_once_stop_is_requested() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let toolkit = FakeToolkit::new(600.0);
        let stop = AtomicBool::new(false);

        let err = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &|| {
            // request the stop once the first cut is on disk
            if !toolkit.calls(CutMode::Copy).is_empty() {
                stop.store(true, Ordering::SeqCst);
            }
            stop.load(Ordering::SeqCst)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::Cancelled));
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 1);
        assert!(toolkit.calls(CutMode::Reencode).is_empty());
    }

    #[tokio::test]
    async fn test_split_does_not_fall_back_after_stop() {
        let dir = TempDir::new().unwrap();
        let input = source_file(&dir);
        let mut toolkit = FakeToolkit::new(600.0);
        toolkit.copy_fails_from = Some(1);

        let err = split_media(&toolkit, &input, &dir.path().join("parts"), 3, &|| {
            !toolkit.calls(CutMode::Copy).is_empty()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::Cancelled));
        assert_eq!(toolkit.calls(CutMode::Copy).len(), 1);
        assert!(toolkit.calls(CutMode::Reencode).is_empty());
    }
}
