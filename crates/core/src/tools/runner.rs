//! Process execution behind the tool bridge.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::ToolsConfig;
use super::error::ToolError;
use super::types::{ToolInvocation, ToolKind, ToolOutput};
use crate::metrics::{TOOL_DURATION, TOOL_INVOCATIONS};

/// Runs fully built tool invocations.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the invocation to completion.
    ///
    /// A non-zero exit status is reported as [`ToolError::Failed`].
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes.
pub struct ProcessToolRunner {
    config: ToolsConfig,
}

impl ProcessToolRunner {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    fn program(&self, tool: ToolKind) -> &std::path::Path {
        match tool {
            ToolKind::Ffmpeg => &self.config.ffmpeg_path,
            ToolKind::Ffprobe => &self.config.ffprobe_path,
        }
    }

    /// Checks both binaries answer `-version`.
    pub async fn validate(&self) -> Result<(), ToolError> {
        for tool in [ToolKind::Ffmpeg, ToolKind::Ffprobe] {
            let path = self.program(tool);
            let result = Command::new(path)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                if e.kind() == std::io::ErrorKind::NotFound {
                    return Err(ToolError::NotFound {
                        tool: tool.to_string(),
                        path: path.to_path_buf(),
                    });
                }
                return Err(ToolError::Io(e));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let program = self.program(invocation.tool);
        let operation = invocation.operation;
        debug!(%operation, args = ?invocation.args, "Running {}", invocation.tool);

        let start = Instant::now();
        let child = Command::new(program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        tool: invocation.tool.to_string(),
                        path: program.to_path_buf(),
                    }
                } else {
                    ToolError::Io(e)
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                TOOL_INVOCATIONS
                    .with_label_values(&[operation.as_str(), "timeout"])
                    .inc();
                return Err(ToolError::Timeout {
                    operation,
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        TOOL_DURATION
            .with_label_values(&[operation.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let result = ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            TOOL_INVOCATIONS
                .with_label_values(&[operation.as_str(), "failed"])
                .inc();
            warn!(
                %operation,
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "Tool exited unsuccessfully"
            );
            return Err(ToolError::failed(operation, result.code, result.stderr));
        }

        TOOL_INVOCATIONS
            .with_label_values(&[operation.as_str(), "success"])
            .inc();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOperation;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_binary_reports_not_found() {
        let runner = ProcessToolRunner::new(ToolsConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        let invocation = ToolInvocation::ffprobe(ToolOperation::Probe, vec!["-version".into()]);
        let result = runner.run(&invocation).await;
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let runner = ProcessToolRunner::new(ToolsConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        assert!(matches!(
            runner.validate().await,
            Err(ToolError::NotFound { .. })
        ));
    }
}
