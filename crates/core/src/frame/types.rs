//! Frame and geometry types shared by the batch and streaming pipelines.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-channel alpha mask travelling alongside a working frame.
pub type Mask = GrayImage;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scales both sides, rounding to the nearest even value as most encoders require.
    pub fn scale(&self, factor: f64) -> Self {
        let even = |side: u32| -> u32 {
            let scaled = (side as f64 * factor / 2.0).round() as u32 * 2;
            scaled.max(2)
        };
        Self::new(even(self.width), even(self.height))
    }

    /// Largest resolution with the same aspect ratio that fits inside `bound`.
    ///
    /// Never upscales: a resolution already within the bound is returned unchanged.
    pub fn fit_within(&self, bound: Resolution) -> Self {
        if self.width <= bound.width && self.height <= bound.height {
            return *self;
        }
        let ratio = f64::min(
            bound.width as f64 / self.width as f64,
            bound.height as f64 / self.height as f64,
        );
        Self::new(
            ((self.width as f64 * ratio).round() as u32).max(1),
            ((self.height as f64 * ratio).round() as u32).max(1),
        )
    }

    /// Component-wise minimum, used to keep a scaled output below the source size.
    pub fn restrict_to(&self, limit: Resolution) -> Self {
        Self::new(self.width.min(limit.width), self.height.min(limit.height))
    }

    /// Bytes of one packed RGB24 frame.
    pub fn rgb_frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Parses `WIDTHxHEIGHT`.
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once('x')?;
        let width = w.parse::<u32>().ok()?;
        let height = h.parse::<u32>().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self::new(width, height))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Image format used for temp frames on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Png,
    Jpg,
    Bmp,
}

impl FrameFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Png => "png",
            FrameFormat::Jpg => "jpg",
            FrameFormat::Bmp => "bmp",
        }
    }

    /// Whether frames in this format keep an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, FrameFormat::Png)
    }
}

/// An RGB frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Frame filled with a single colour.
    pub fn solid(resolution: Resolution, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(
            resolution.width,
            resolution.height,
            image::Rgb(rgb),
        ))
    }

    /// Wraps a packed RGB24 buffer; `None` when the length does not match.
    pub fn from_rgb_bytes(resolution: Resolution, bytes: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(resolution.width, resolution.height, bytes).map(Self::new)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Colour of the top-left pixel.
    pub fn first_pixel(&self) -> Option<[u8; 3]> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return None;
        }
        Some(self.image.get_pixel(0, 0).0)
    }
}

/// Interleaved signed 16-bit audio samples belonging to one video frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub channels: u16,
}

impl AudioFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0)
    }
}
