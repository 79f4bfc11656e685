//! Frame decoding, encoding and pixel operations.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

use super::types::{Frame, Mask, Resolution};

/// Side of the blocks a redacted frame is reduced to.
const REDACT_BLOCK: u32 = 32;

/// Errors raised while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mask is {mask} but frame is {frame}")]
    MaskMismatch { frame: Resolution, mask: Resolution },
}

/// Reads a frame from disk, splitting off the alpha channel as a mask when present.
pub fn load_frame(path: &Path) -> Result<(Frame, Option<Mask>), FrameError> {
    let decoded = image::open(path)?;
    Ok(split_alpha(decoded))
}

/// Decodes an encoded image held in memory.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(Frame::new(decoded.to_rgb8()))
}

fn split_alpha(decoded: DynamicImage) -> (Frame, Option<Mask>) {
    if !decoded.color().has_alpha() {
        return (Frame::new(decoded.to_rgb8()), None);
    }
    let rgba = decoded.to_rgba8();
    let mask = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        image::Luma([rgba.get_pixel(x, y).0[3]])
    });
    (Frame::new(DynamicImage::ImageRgba8(rgba).to_rgb8()), Some(mask))
}

/// Merges a mask back in as the alpha channel.
pub fn merge_mask(frame: &Frame, mask: &Mask) -> Result<RgbaImage, FrameError> {
    let resolution = frame.resolution();
    let mask_resolution = Resolution::new(mask.width(), mask.height());
    if resolution != mask_resolution {
        return Err(FrameError::MaskMismatch {
            frame: resolution,
            mask: mask_resolution,
        });
    }
    let rgb = frame.image();
    Ok(RgbaImage::from_fn(resolution.width, resolution.height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        image::Rgba([r, g, b, mask.get_pixel(x, y).0[0]])
    }))
}

/// Writes a frame, format chosen from the path extension.
///
/// The mask is merged as alpha only when the format can carry it.
pub fn save_frame(path: &Path, frame: &Frame, mask: Option<&Mask>) -> Result<(), FrameError> {
    let keeps_alpha = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false);

    match mask {
        Some(mask) if keeps_alpha => merge_mask(frame, mask)?.save(path)?,
        _ => frame.image().save(path)?,
    }
    Ok(())
}

/// JPEG-encodes a frame for egress.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, FrameError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    frame.image().write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

/// Downscales to fit inside `bound`, keeping the aspect ratio. Smaller frames are returned as is.
pub fn downscale(frame: Frame, bound: Resolution) -> Frame {
    let target = frame.resolution().fit_within(bound);
    if target == frame.resolution() {
        return frame;
    }
    Frame::new(imageops::resize(
        frame.image(),
        target.width,
        target.height,
        FilterType::Triangle,
    ))
}

/// Pixelates a frame beyond recognition, keeping its size.
pub fn redact(frame: &Frame) -> Frame {
    let resolution = frame.resolution();
    let small_w = (resolution.width / REDACT_BLOCK).max(1);
    let small_h = (resolution.height / REDACT_BLOCK).max(1);
    let small = imageops::resize(frame.image(), small_w, small_h, FilterType::Triangle);
    Frame::new(imageops::resize(
        &small,
        resolution.width,
        resolution.height,
        FilterType::Nearest,
    ))
}
