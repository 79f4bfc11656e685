//! Per-frame slices of a decoded audio source.

use crate::frame::AudioFrame;

/// Decoded PCM of one source, sliced into chunks aligned with video frames.
#[derive(Debug, Clone)]
pub struct AudioSlicer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    fps: f64,
}

impl AudioSlicer {
    pub fn new(samples: Vec<i16>, channels: u16, sample_rate: u32, fps: f64) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
            fps,
        }
    }

    /// Samples per channel covering one video frame.
    pub fn samples_per_frame(&self) -> usize {
        if self.fps <= 0.0 {
            return 0;
        }
        (self.sample_rate as f64 / self.fps).round() as usize
    }

    /// Number of whole or partial frames the audio covers.
    pub fn frame_total(&self) -> u64 {
        let per_frame = self.samples_per_frame() * self.channels as usize;
        if per_frame == 0 {
            return 0;
        }
        self.samples.len().div_ceil(per_frame) as u64
    }

    /// Audio for frame `number`; empty once past the end of the source.
    pub fn frame(&self, number: u64) -> AudioFrame {
        let width = self.samples_per_frame() * self.channels as usize;
        let start = (number as usize).saturating_mul(width);
        if width == 0 || start >= self.samples.len() {
            return AudioFrame {
                samples: Vec::new(),
                channels: self.channels,
            };
        }
        let end = (start + width).min(self.samples.len());
        AudioFrame {
            samples: self.samples[start..end].to_vec(),
            channels: self.channels,
        }
    }
}
