//! Frames, masks and the pixel operations both pipelines share.

mod io;
mod types;

pub use io::{
    decode_frame, downscale, encode_jpeg, load_frame, merge_mask, redact, save_frame, FrameError,
};
pub use types::{AudioFrame, Frame, FrameFormat, Mask, Resolution};
