use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::matching::DEFAULT_THRESHOLD;

/// Raw pixel-difference similarity test
///
/// Two images match when the mean absolute per-channel difference,
/// normalized to `0.0..=1.0`, does not exceed the threshold.
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    threshold: f64,
}

impl Comparator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn compare(&self, reference: &RgbImage, candidate: &RgbImage) -> bool {
        compare(reference, candidate, self.threshold)
    }

    /// Resize a candidate to the given dimensions once, so that repeated
    /// comparisons against frames of that size skip the resize
    pub fn prepare(candidate: &RgbImage, width: u32, height: u32) -> RgbImage {
        if candidate.dimensions() == (width, height) {
            candidate.clone()
        } else {
            imageops::resize(candidate, width, height, FilterType::Triangle)
        }
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Compare `candidate` against `reference`
///
/// A candidate with other dimensions is resized to the reference first.
/// That is an approximation, not an error.
pub fn compare(reference: &RgbImage, candidate: &RgbImage, threshold: f64) -> bool {
    mean_difference(reference, candidate) <= threshold
}

/// Mean absolute per-channel difference in `0.0..=1.0`
pub fn mean_difference(reference: &RgbImage, candidate: &RgbImage) -> f64 {
    let (width, height) = reference.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let resized;
    let candidate = if candidate.dimensions() != (width, height) {
        resized = imageops::resize(candidate, width, height, FilterType::Triangle);
        &resized
    } else {
        candidate
    };

    let total: u64 = reference
        .as_raw()
        .iter()
        .zip(candidate.as_raw())
        .map(|(&a, &b)| a.abs_diff(b) as u64)
        .sum();

    total as f64 / (reference.as_raw().len() as f64 * 255.0)
}
