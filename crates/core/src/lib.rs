pub mod batch;
pub mod config;
pub mod frame;
pub mod metrics;
pub mod moderation;
pub mod processing;
pub mod streaming;
pub mod temp;
pub mod testing;
pub mod tools;
pub mod workflow;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use frame::{Frame, FrameError, Resolution};
pub use moderation::{Classifier, ModerationGate, NoopClassifier};
pub use processing::{FramePipeline, FrameProcessor, ProcessorError, ProcessorRegistry};
pub use streaming::{SessionRegistry, StreamError, StreamingSession};
pub use temp::{TempFrame, TempLayout};
pub use tools::{ToolBridge, ToolError};
pub use workflow::{ErrorCode, ProcessingJobContext, WorkflowEngine, WorkflowVariant};
