use std::collections::HashMap;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::Result;
use crate::events::{Observer, Reporter};
use crate::marker::artifacts::remove_if_exists;
use crate::marker::pipeline::CancelToken;
use crate::marker::{MarkedRange, MarkerOutcome, StageOutcome};
use crate::media::MediaEngine;
use crate::video::{Frame, VideoProperties};

/// Scale an image to fit `width`x`height` keeping its aspect ratio and
/// center it on a black canvas of exactly that size
pub fn letterbox(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return canvas;
    }

    let scale = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
    let fit_w = ((src_w as f64 * scale) as u32).clamp(1, width);
    let fit_h = ((src_h as f64 * scale) as u32).clamp(1, height);

    let resized = imageops::resize(image, fit_w, fit_h, FilterType::Triangle);
    let x = (width - fit_w) / 2;
    let y = (height - fit_h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    canvas
}

/// Builds the visual marker track
pub struct FrameCompositor<'a> {
    media: &'a dyn MediaEngine,
}

impl<'a> FrameCompositor<'a> {
    pub fn new(media: &'a dyn MediaEngine) -> Self {
        Self { media }
    }

    /// Encode `properties.total_frame_count` frames into `path`
    ///
    /// Frames covered by a range show that range's target letterboxed to
    /// the video size; later ranges win where ranges overlap. All other
    /// frames are black. On cancellation the partial file is removed.
    pub fn build_video_track(
        &self,
        properties: &VideoProperties,
        ranges: &[MarkedRange],
        path: &Path,
        cancel: &CancelToken,
        observer: &dyn Observer<MarkerOutcome>,
    ) -> Result<StageOutcome> {
        let mut reporter = Reporter::new(observer);
        let (width, height) = (properties.width, properties.height);
        let total = properties.total_frame_count;

        // One canvas per distinct target; None if it could not be decoded
        let mut slots: HashMap<&Path, usize> = HashMap::new();
        let mut canvases: Vec<Option<Frame>> = Vec::new();
        for range in ranges {
            if slots.contains_key(range.target_path.as_path()) {
                continue;
            }
            let canvas = match image::open(&range.target_path) {
                Ok(image) => Some(Frame::new(letterbox(&image.to_rgb8(), width, height))),
                Err(e) => {
                    reporter.warn(format!(
                        "Could not load target image {}: {}. Its frames stay black.",
                        range.target_path.display(),
                        e
                    ));
                    None
                }
            };
            slots.insert(range.target_path.as_path(), canvases.len());
            canvases.push(canvas);
        }

        let frame_map = frame_assignments(ranges, total, &slots);
        debug!("{} of {} frames carry a target", frame_map.len(), total);

        let black = Frame::new_black(width, height);
        let mut writer = self.media.video_writer(path, properties)?;

        for index in 0..total {
            if cancel.is_cancelled() {
                drop(writer);
                remove_if_exists(path);
                reporter.info("Marker video generation cancelled.");
                return Ok(StageOutcome::Cancelled);
            }

            let frame = frame_map
                .get(&index)
                .and_then(|&slot| canvases[slot].as_ref())
                .unwrap_or(&black);

            if let Err(e) = writer.write_frame(frame) {
                drop(writer);
                remove_if_exists(path);
                return Err(e);
            }

            if index % 100 == 0 {
                reporter.progress(((index as f64 / total as f64) * 50.0) as u8);
            }
        }

        writer.finish()?;
        reporter.info("Marker video frames generated.");
        Ok(StageOutcome::Completed)
    }
}

/// Frame index → canvas slot, expanding every range; later ranges overwrite
fn frame_assignments(
    ranges: &[MarkedRange],
    total: u64,
    slots: &HashMap<&Path, usize>,
) -> HashMap<u64, usize> {
    let mut frame_map = HashMap::new();
    for range in ranges {
        let Some(&slot) = slots.get(range.target_path.as_path()) else {
            continue;
        };
        let end = range.end_frame.min(total.saturating_sub(1));
        if total == 0 || range.start_frame > end {
            continue;
        }
        for index in range.start_frame..=end {
            frame_map.insert(index, slot);
        }
    }
    frame_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use image::Rgb;
    use tempfile::tempdir;

    use crate::events::tests::RecordingObserver;
    use crate::events::{LogLevel, NullObserver};
    use crate::testing::{write_png, RecordingMedia};

    fn props(width: u32, height: u32, total: u64) -> VideoProperties {
        VideoProperties {
            width,
            height,
            frame_rate: 30.0,
            total_frame_count: total,
        }
    }

    #[test]
    fn test_letterbox_wide_image() {
        let image = RgbImage::from_pixel(200, 50, Rgb([255, 255, 255]));
        let canvas = letterbox(&image, 100, 100);

        assert_eq!(canvas.dimensions(), (100, 100));
        // 200x50 scales to 100x25, centered at y = 37
        assert_eq!(canvas.get_pixel(50, 10), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(50, 50), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(50, 36), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(50, 37), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(50, 61), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(50, 62), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_letterbox_tiny_image_keeps_one_pixel() {
        let image = RgbImage::from_pixel(1000, 1, Rgb([9, 9, 9]));
        let canvas = letterbox(&image, 10, 10);
        assert_eq!(canvas.dimensions(), (10, 10));
        assert_eq!(canvas.get_pixel(5, 4), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_later_ranges_overwrite_earlier() {
        let a = PathBuf::from("/t/a.png");
        let b = PathBuf::from("/t/b.png");
        let ranges = vec![
            MarkedRange::new(0, 10, &a),
            MarkedRange::new(5, 6, &b),
            MarkedRange::new(8, 50, &b),
        ];
        let slots: HashMap<&Path, usize> =
            [(a.as_path(), 0), (b.as_path(), 1)].into_iter().collect();

        let map = frame_assignments(&ranges, 12, &slots);

        assert_eq!(map[&4], 0);
        assert_eq!(map[&5], 1);
        assert_eq!(map[&7], 0);
        assert_eq!(map[&11], 1);
        assert!(!map.contains_key(&12));
    }

    #[test]
    fn test_track_has_every_frame() {
        let dir = tempdir().unwrap();
        let target = write_png(dir.path(), "logo.png", 8, 8, [200, 30, 30]);
        let media = RecordingMedia::new();
        let out = dir.path().join("track.mp4");

        let ranges = [MarkedRange::new(3, 5, &target)];
        let cancel = CancelToken::new();
        let outcome = FrameCompositor::new(&media)
            .build_video_track(&props(16, 12, 25), &ranges, &out, &cancel, &NullObserver)
            .unwrap();

        assert_eq!(outcome, StageOutcome::Completed);
        let frames = media.frames();
        assert_eq!(frames.len(), 25);
        assert!(frames.iter().all(|f| f.width() == 16 && f.height() == 12));
        assert!(frames[2].is_black());
        assert!(!frames[3].is_black());
        assert!(!frames[5].is_black());
        assert!(frames[6].is_black());
        assert!(out.exists());
    }

    #[test]
    fn test_unreadable_target_stays_black() {
        let dir = tempdir().unwrap();
        let media = RecordingMedia::new();
        let observer = RecordingObserver::<MarkerOutcome>::new();
        let missing = dir.path().join("missing.png");
        let ranges = [MarkedRange::new(0, 1, &missing), MarkedRange::new(3, 4, &missing)];

        let out = dir.path().join("t.mp4");
        FrameCompositor::new(&media)
            .build_video_track(&props(8, 8, 5), &ranges, &out, &CancelToken::new(), &observer)
            .unwrap();

        assert!(media.frames().iter().all(Frame::is_black));
        let warnings = observer
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == LogLevel::Warn)
            .count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_cancel_removes_partial_track() {
        let dir = tempdir().unwrap();
        let cancel = CancelToken::new();
        let media = RecordingMedia::new().cancel_after(10, cancel.clone());
        let out = dir.path().join("track.mp4");

        let outcome = FrameCompositor::new(&media)
            .build_video_track(&props(8, 8, 100), &[], &out, &cancel, &NullObserver)
            .unwrap();

        assert_eq!(outcome, StageOutcome::Cancelled);
        assert_eq!(media.frames().len(), 10);
        assert!(!out.exists());
    }
}
