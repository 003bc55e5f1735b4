use image::{ImageBuffer, RgbImage};
use serde::{Deserialize, Serialize};

/// Represents a single video frame
///
/// Thin wrapper around an RGB image buffer. Decoded source frames, target
/// canvases and marker frames all share this type.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// True when every channel of every pixel is zero
    #[cfg(test)]
    pub(crate) fn is_black(&self) -> bool {
        self.buffer.as_raw().iter().all(|&v| v == 0)
    }
}

/// Stream properties of a source video, read once per video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub total_frame_count: u64,
}

impl VideoProperties {
    /// Duration in seconds derived from frame count and rate
    pub fn duration(&self) -> f64 {
        if self.frame_rate > 0.0 {
            self.total_frame_count as f64 / self.frame_rate
        } else {
            0.0
        }
    }

    /// Presentation time of a frame index
    pub fn time_of_frame(&self, frame_index: u64) -> f64 {
        if self.frame_rate > 0.0 {
            frame_index as f64 / self.frame_rate
        } else {
            0.0
        }
    }

    /// Size in bytes of one rgb24 frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// A frame handed out by a [`VideoSource`](crate::video::VideoSource)
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: u64,
    pub timestamp: f64,
    pub frame: Frame,
}
