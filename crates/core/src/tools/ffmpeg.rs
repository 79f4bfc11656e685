//! FFmpeg argument builders.
//!
//! Every builder returns a plain argument vector; running it is the
//! [`ToolRunner`](super::ToolRunner)'s job. Keeping the two apart lets tests
//! assert on exact command lines without spawning anything.

use std::path::Path;

use super::types::TrimRange;
use crate::config::OutputConfig;
use crate::frame::Resolution;

/// Builds ffmpeg command lines for the workflow and streaming operations.
#[derive(Debug, Clone)]
pub struct FfmpegArgs {
    log_level: String,
    output: OutputConfig,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn seconds(value: f64) -> String {
    format!("{:.3}", value)
}

fn is_network_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Maps 0-100 quality onto a codec scale where lower is better.
fn inverted_scale(quality: u8, worst: f64) -> u32 {
    let quality = quality.min(100) as f64;
    (worst - quality * worst / 100.0).round() as u32
}

impl FfmpegArgs {
    pub fn new(log_level: impl Into<String>, output: OutputConfig) -> Self {
        Self {
            log_level: log_level.into(),
            output,
        }
    }

    fn base(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ]
    }

    fn image_quality_args(&self, output_path: &Path) -> Vec<String> {
        match extension_of(output_path).as_str() {
            "jpg" | "jpeg" => vec![
                "-q:v".to_string(),
                inverted_scale(self.output.image_quality, 31.0).max(1).to_string(),
            ],
            "webp" => vec![
                "-quality".to_string(),
                self.output.image_quality.min(100).to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn video_quality_args(&self) -> Vec<String> {
        let encoder = self.output.video_encoder.as_str();
        let quality = self.output.video_quality;
        match encoder {
            "libx264" | "libx265" => vec![
                "-crf".to_string(),
                inverted_scale(quality, 51.0).to_string(),
                "-preset".to_string(),
                self.output.video_preset.clone(),
            ],
            "libvpx-vp9" => vec![
                "-crf".to_string(),
                inverted_scale(quality, 63.0).to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ],
            _ => vec!["-q:v".to_string(), inverted_scale(quality, 31.0).to_string()],
        }
    }

    /// Extracts the trimmed frames of a video as numbered images.
    pub fn extract_frames(
        &self,
        target: &Path,
        frame_pattern: &Path,
        resolution: Resolution,
        fps: f64,
        trim: TrimRange,
        frame_total: u64,
    ) -> Vec<String> {
        let mut args = self.base();
        args.extend(["-i".to_string(), path_arg(target)]);

        let mut filters = Vec::new();
        if trim.is_trimmed(frame_total) {
            filters.push(format!(
                "trim=start_frame={}:end_frame={}",
                trim.start, trim.end
            ));
        }
        filters.push(format!("fps={}", fps));

        args.extend([
            "-vf".to_string(),
            filters.join(","),
            "-s".to_string(),
            resolution.to_string(),
            "-q:v".to_string(),
            "0".to_string(),
            "-vsync".to_string(),
            "0".to_string(),
            path_arg(frame_pattern),
        ]);
        args
    }

    /// Extracts every `step`-th frame within the trim range, for content analysis.
    pub fn sample_frames(
        &self,
        target: &Path,
        frame_pattern: &Path,
        trim: TrimRange,
        step: u64,
    ) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-i".to_string(),
            path_arg(target),
            "-vf".to_string(),
            format!(
                "trim=start_frame={}:end_frame={},select=not(mod(n\\,{}))",
                trim.start,
                trim.end,
                step.max(1)
            ),
            "-vsync".to_string(),
            "0".to_string(),
            path_arg(frame_pattern),
        ]);
        args
    }

    /// Repeats a still image as `frame_count` numbered frames.
    pub fn spawn_frames(
        &self,
        target_image: &Path,
        frame_pattern: &Path,
        resolution: Resolution,
        fps: f64,
        frame_count: u64,
    ) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            path_arg(target_image),
            "-frames:v".to_string(),
            frame_count.to_string(),
            "-s".to_string(),
            resolution.to_string(),
            path_arg(frame_pattern),
        ]);
        args
    }

    /// Encodes numbered frames into a silent temp video.
    pub fn merge_video(
        &self,
        frame_pattern: &Path,
        temp_video: &Path,
        fps: f64,
        resolution: Resolution,
    ) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-framerate".to_string(),
            fps.to_string(),
            "-start_number".to_string(),
            "1".to_string(),
            "-i".to_string(),
            path_arg(frame_pattern),
            "-s".to_string(),
            resolution.to_string(),
            "-c:v".to_string(),
            self.output.video_encoder.clone(),
        ]);
        args.extend(self.video_quality_args());
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            fps.to_string(),
            path_arg(temp_video),
        ]);
        args
    }

    /// Muxes the target's own audio (within the trim range) onto the temp video.
    pub fn restore_audio(
        &self,
        temp_video: &Path,
        target: &Path,
        trim: TrimRange,
        target_fps: f64,
        frame_total: u64,
        output: &Path,
    ) -> Vec<String> {
        let mut args = self.base();
        args.extend(["-i".to_string(), path_arg(temp_video)]);
        if trim.is_trimmed(frame_total) && target_fps > 0.0 {
            args.extend([
                "-ss".to_string(),
                seconds(trim.start as f64 / target_fps),
                "-to".to_string(),
                seconds(trim.end as f64 / target_fps),
            ]);
        }
        args.extend(["-i".to_string(), path_arg(target)]);
        args.extend(self.audio_mux_tail(output));
        args
    }

    /// Muxes an external audio source onto the temp video.
    pub fn replace_audio(&self, temp_video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-i".to_string(),
            path_arg(temp_video),
            "-i".to_string(),
            path_arg(audio),
        ]);
        args.extend(self.audio_mux_tail(output));
        args
    }

    fn audio_mux_tail(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            self.output.audio_encoder.clone(),
        ];
        if self.output.audio_volume < 100 {
            args.extend([
                "-filter:a".to_string(),
                format!("volume={:.2}", self.output.audio_volume as f64 / 100.0),
            ]);
        }
        args.extend([
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-shortest".to_string(),
            path_arg(output),
        ]);
        args
    }

    /// Copies the target image into the temp directory at the working resolution.
    pub fn copy_image(&self, target: &Path, temp_image: &Path, resolution: Resolution) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-i".to_string(),
            path_arg(target),
            "-s".to_string(),
            resolution.to_string(),
        ]);
        args.extend(self.image_quality_args(temp_image));
        args.push(path_arg(temp_image));
        args
    }

    /// Re-encodes the processed temp image into the output path.
    pub fn finalize_image(&self, temp_image: &Path, output: &Path, resolution: Resolution) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-i".to_string(),
            path_arg(temp_image),
            "-s".to_string(),
            resolution.to_string(),
        ]);
        args.extend(self.image_quality_args(output));
        args.push(path_arg(output));
        args
    }

    /// Decodes an audio file to interleaved s16le PCM on stdout.
    pub fn extract_audio_pcm(&self, audio: &Path, sample_rate: u32, channels: u16) -> Vec<String> {
        let mut args = self.base();
        args.extend([
            "-i".to_string(),
            path_arg(audio),
            "-vn".to_string(),
            "-f".to_string(),
            "s16le".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-ac".to_string(),
            channels.to_string(),
            "-".to_string(),
        ]);
        args
    }

    /// Reads a (possibly remote) source as raw RGB24 frames on stdout.
    pub fn stream_raw_video(
        &self,
        url: &str,
        resolution: Resolution,
        start_secs: f64,
        user_agent: Option<&str>,
    ) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            "-nostdin".to_string(),
        ];
        if is_network_url(url) {
            if let Some(agent) = user_agent {
                args.extend(["-user_agent".to_string(), agent.to_string()]);
            }
            args.extend([
                "-reconnect".to_string(),
                "1".to_string(),
                "-reconnect_streamed".to_string(),
                "1".to_string(),
                "-reconnect_delay_max".to_string(),
                "5".to_string(),
            ]);
        }
        if start_secs > 0.0 {
            args.extend(["-ss".to_string(), seconds(start_secs)]);
        }
        args.extend([
            "-i".to_string(),
            url.to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            resolution.to_string(),
            "-".to_string(),
        ]);
        args
    }
}
