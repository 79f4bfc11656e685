//! FFprobe argument builders and output parsing.

use serde::Deserialize;
use std::path::Path;

use super::error::ToolError;
use super::types::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
use crate::frame::Resolution;

/// Full JSON probe of format and streams.
pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Single-value query against the first audio stream.
///
/// `entries` follows ffprobe's `-show_entries` syntax, e.g. `stream=sample_rate`.
pub fn audio_entry_args(path: &Path, entries: &str) -> Vec<String> {
    vec![
        "-loglevel".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "a:0".to_string(),
        "-show_entries".to_string(),
        entries.to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parses the first non-empty line of a `nokey=1` query.
pub fn parse_entry<T: std::str::FromStr>(output: &str) -> Result<T, ToolError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && *l != "N/A")
        .ok_or_else(|| ToolError::malformed("ffprobe returned no value"))?;
    line.parse::<T>()
        .map_err(|_| ToolError::malformed(format!("unexpected ffprobe value: {}", line)))
}

/// Parses a rate like `24000/1001` or `30`.
pub fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den > 0.0 && num > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => rate.parse::<f64>().ok().filter(|r| *r > 0.0),
    }
}

/// Parses ffprobe JSON output into [`MediaInfo`].
pub fn parse_probe_output(output: &str) -> Result<MediaInfo, ToolError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: String,
        duration: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: String,
        codec_name: Option<String>,
        sample_rate: Option<String>,
        channels: Option<u16>,
        width: Option<u32>,
        height: Option<u32>,
        avg_frame_rate: Option<String>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
        duration: Option<String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ToolError::malformed(format!("Failed to parse ffprobe output: {}", e)))?;

    let parse_secs = |value: &Option<String>| value.as_ref().and_then(|d| d.parse::<f64>().ok());
    let duration_secs = parse_secs(&probe.format.duration).unwrap_or(0.0);

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .and_then(|s| {
            let resolution = Resolution::new(s.width?, s.height?);
            let fps = s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate))?;
            let stream_duration = parse_secs(&s.duration).unwrap_or(duration_secs);
            let frame_total = s
                .nb_frames
                .as_ref()
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or_else(|| (stream_duration * fps).floor() as u64);
            Some(VideoStreamInfo {
                resolution,
                fps,
                frame_total,
            })
        });

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .and_then(|s| {
            let sample_rate = s.sample_rate.as_ref()?.parse::<u32>().ok()?;
            let stream_duration = parse_secs(&s.duration).unwrap_or(duration_secs);
            Some(AudioStreamInfo {
                codec: s.codec_name.clone(),
                sample_rate,
                channels: s.channels.unwrap_or(2),
                frame_total: (stream_duration * sample_rate as f64).floor() as u64,
            })
        });

    let format = probe
        .format
        .format_name
        .split(',')
        .next()
        .unwrap_or("unknown")
        .to_string();

    Ok(MediaInfo {
        format,
        duration_secs,
        video,
        audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "test.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "10.0"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "avg_frame_rate": "25/1",
                    "r_frame_rate": "25/1",
                    "nb_frames": "250"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2,
                    "duration": "10.0"
                }
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.format, "mov");
        let video = info.video.unwrap();
        assert_eq!(video.resolution, Resolution::new(1920, 1080));
        assert!((video.fps - 25.0).abs() < f64::EPSILON);
        assert_eq!(video.frame_total, 250);
        let audio = info.audio.unwrap();
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.frame_total, 480000);
        assert_eq!(audio.codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_parse_probe_output_estimates_frame_total() {
        let json = r#"{
            "format": { "format_name": "matroska,webm", "duration": "4.0" },
            "streams": [
                {
                    "codec_type": "video",
                    "width": 640,
                    "height": 360,
                    "avg_frame_rate": "0/0",
                    "r_frame_rate": "30000/1001"
                }
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        let video = info.video.unwrap();
        assert!((video.fps - 29.97).abs() < 0.01);
        assert_eq!(video.frame_total, 119);
        assert!(info.audio.is_none());
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(ToolError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(parse_entry::<u32>("44100\n").unwrap(), 44100);
        assert_eq!(parse_entry::<String>("\nmp3\n").unwrap(), "mp3");
        assert!(parse_entry::<u32>("N/A\n").is_err());
        assert!(parse_entry::<u32>("").is_err());
    }

    #[test]
    fn test_audio_entry_args() {
        let args = audio_entry_args(Path::new("/in/a.wav"), "stream=channels");
        assert_eq!(args[0], "-loglevel");
        assert!(args.contains(&"a:0".to_string()));
        assert!(args.contains(&"default=noprint_wrappers=1:nokey=1".to_string()));
        assert_eq!(args.last().unwrap(), "/in/a.wav");
    }
}
