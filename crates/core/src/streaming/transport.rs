//! Transport seams for live sessions.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{OutputFrame, SessionEvent, StreamError};
use crate::frame::Frame;

/// Where a session's input frames come from.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame; `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError>;
}

/// Where a session's output goes.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: &OutputFrame) -> Result<(), StreamError>;

    async fn send_event(&mut self, event: &SessionEvent) -> Result<(), StreamError>;
}

/// Frames pushed in over a channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<Frame>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Frame>) -> Self {
        Self { rx }
    }

    /// Source plus the sender feeding it.
    pub fn pair(buffer: usize) -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        Ok(self.rx.recv().await)
    }
}

/// Output forwarded over a channel.
#[derive(Debug, Clone)]
pub enum SinkMessage {
    Frame(OutputFrame),
    Event(SessionEvent),
}

pub struct ChannelSink {
    tx: mpsc::Sender<SinkMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SinkMessage>) -> Self {
        Self { tx }
    }

    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<SinkMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: &OutputFrame) -> Result<(), StreamError> {
        self.tx
            .send(SinkMessage::Frame(frame.clone()))
            .await
            .map_err(|_| StreamError::Closed)
    }

    async fn send_event(&mut self, event: &SessionEvent) -> Result<(), StreamError> {
        self.tx
            .send(SinkMessage::Event(*event))
            .await
            .map_err(|_| StreamError::Closed)
    }
}
