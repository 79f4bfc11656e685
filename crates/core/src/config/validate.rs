use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn check_scale(name: &str, scale: f64) -> Result<(), ConfigError> {
    if !(scale > 0.0 && scale <= 4.0) {
        return Err(invalid(format!("{} must be in (0, 4], got {}", name, scale)));
    }
    Ok(())
}

/// Validate configuration.
///
/// Rejects values the pipeline cannot run with: zero worker or buffer sizes,
/// non-positive rates and scales outside (0, 4].
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.execution.thread_count == 0 {
        return Err(invalid("execution.thread_count must be at least 1"));
    }
    if config.execution.analysis_sample_rate == 0 {
        return Err(invalid("execution.analysis_sample_rate must be at least 1"));
    }

    if let Some(fps) = config.output.video_fps {
        if !(fps > 0.0) {
            return Err(invalid(format!("output.video_fps must be positive, got {}", fps)));
        }
    }
    check_scale("output.video_scale", config.output.video_scale)?;
    check_scale("output.image_scale", config.output.image_scale)?;
    if config.output.video_quality > 100 || config.output.image_quality > 100 {
        return Err(invalid("output quality values must be within 0-100"));
    }
    if config.output.audio_volume > 100 {
        return Err(invalid("output.audio_volume must be within 0-100"));
    }

    let streaming = &config.streaming;
    if streaming.buffer_size == 0 {
        return Err(invalid("streaming.buffer_size must be at least 1"));
    }
    if streaming.frame_skip == 0 {
        return Err(invalid("streaming.frame_skip must be at least 1"));
    }
    if !(streaming.max_fps > 0.0) {
        return Err(invalid(format!(
            "streaming.max_fps must be positive, got {}",
            streaming.max_fps
        )));
    }
    if streaming.moderation_sample_interval == 0 {
        return Err(invalid("streaming.moderation_sample_interval must be at least 1"));
    }
    if streaming.bitrate_poll_interval_ms == 0 {
        return Err(invalid("streaming.bitrate_poll_interval_ms must be at least 1"));
    }

    if config.tools.timeout_secs == 0 {
        return Err(invalid("tools.timeout_secs must be at least 1"));
    }

    Ok(())
}
