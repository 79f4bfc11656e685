//! Live sessions.
//!
//! A [`StreamingSession`] takes frames from a [`FrameSource`], runs them
//! through rate limiting, frame skip, moderation and the pipeline, and hands
//! them to a [`FrameSink`] through a bounded drop-oldest queue. An adaptive
//! bitrate controller watches the queue.
//!
//! # Example
//!
//! ```rust,ignore
//! use framefuse_core::streaming::{ChannelSink, ChannelSource, SessionOptions, StreamingSession};
//!
//! let session = StreamingSession::new(SessionOptions::default(), pipeline, sources, classifier);
//! let (frames_tx, source) = ChannelSource::pair(8);
//! let (sink, mut output) = ChannelSink::pair(8);
//! session.open(source)?;
//! session.attach_sink(sink)?;
//!
//! frames_tx.send(frame).await?;
//! while let Some(message) = output.recv().await {
//!     // SinkMessage::Frame / SinkMessage::Event
//! }
//! ```

mod bitrate;
mod config;
mod queue;
mod rate;
mod registry;
mod remote;
mod session;
mod transport;
mod types;

pub use bitrate::{BitrateController, BitrateDirection, BitrateState};
pub use config::{ModerationPrecedence, OutputResolution, StreamingConfig};
pub use queue::FrameQueue;
pub use rate::{FrameSkipPolicy, RateLimiter};
pub use registry::SessionRegistry;
pub use remote::{
    ProcessSpawner, RawStream, RawStreamSpawner, RemoteControl, RemoteFrame, RemoteSource,
    RemoteStreamOptions, StreamHandle,
};
pub use session::StreamingSession;
pub use transport::{ChannelSink, ChannelSource, FrameSink, FrameSource, SinkMessage};
pub use types::{
    OutputFrame, PushOutcome, SessionEvent, SessionInfo, SessionOptions, SessionState, StreamError,
};
