//! WebSocket transport for live sessions.
//!
//! Binary messages from the client are encoded images fed to the session;
//! binary messages to the client are JPEG-encoded output frames. Text
//! messages carry side-channel events out (`ready`, `frame:<n>`,
//! `bitrate:<bps>`) and commands in (`seek:<secs>`).

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use framefuse_core::{
    frame::{decode_frame, encode_jpeg, Frame},
    streaming::{
        ChannelSource, FrameSink, OutputFrame, SessionEvent, SessionOptions, StreamError,
        StreamingSession,
    },
};

use super::handlers::ErrorResponse;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT, WS_REJECTED_MESSAGES,
};
use crate::state::AppState;

/// Decoded frames waiting for the ingest task.
const INGEST_BUFFER: usize = 8;

/// Query parameters for a live session
#[derive(Debug, Default, Deserialize)]
pub struct LiveStreamParams {
    /// Comma-separated source image paths.
    pub sources: Option<String>,
    /// Requested bitrate in kbps; 0 or absent selects adaptive mode.
    pub bitrate: Option<u64>,
    pub buffer_size: Option<usize>,
}

impl LiveStreamParams {
    fn source_paths(&self) -> Vec<PathBuf> {
        self.sources
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Applies per-request overrides on top of the configured session settings.
pub(crate) fn session_options(
    state: &AppState,
    bitrate: Option<u64>,
    buffer_size: Option<usize>,
) -> Result<SessionOptions, (StatusCode, Json<ErrorResponse>)> {
    let mut options = state.session_options();
    if let Some(kbps) = bitrate {
        options = options.with_bitrate(kbps);
    }
    if let Some(size) = buffer_size {
        if size == 0 {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("buffer_size must be at least 1"),
            ));
        }
        options = options.with_buffer_size(size);
    }
    Ok(options)
}

/// A command sent by the client as a text message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientCommand {
    Seek(f64),
}

impl ClientCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let secs = text.trim().strip_prefix("seek:")?.trim().parse::<f64>().ok()?;
        (secs.is_finite() && secs >= 0.0).then_some(ClientCommand::Seek(secs))
    }
}

/// Writes session output to the client half of a WebSocket.
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
    jpeg_quality: u8,
}

impl WsSink {
    pub fn new(sender: SplitSink<WebSocket, Message>, jpeg_quality: u8) -> Self {
        Self {
            sender,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: &OutputFrame) -> Result<(), StreamError> {
        let jpeg = encode_jpeg(&frame.frame, self.jpeg_quality)?;
        self.sender
            .send(Message::Binary(jpeg.into()))
            .await
            .map_err(|_| StreamError::Closed)?;
        WS_MESSAGES_SENT.with_label_values(&["frame"]).inc();
        Ok(())
    }

    async fn send_event(&mut self, event: &SessionEvent) -> Result<(), StreamError> {
        self.sender
            .send(Message::Text(event.to_string().into()))
            .await
            .map_err(|_| StreamError::Closed)?;
        WS_MESSAGES_SENT.with_label_values(&["event"]).inc();
        Ok(())
    }
}

/// What to do with binary messages from the client.
enum Ingress {
    Frames(mpsc::Sender<Frame>),
    /// Remote sessions take their frames from the stream URL.
    Ignore,
}

/// Pumps client messages into `session` until either side goes away.
pub(crate) async fn serve_session(
    socket: WebSocket,
    state: Arc<AppState>,
    session: Arc<StreamingSession>,
    ingress: Option<mpsc::Sender<Frame>>,
) {
    let (sender, receiver) = socket.split();
    let sink = WsSink::new(sender, state.config().output.image_quality);
    if let Err(e) = session.attach_sink(sink) {
        // Another client won the race; the session stays with it.
        WS_REJECTED_MESSAGES
            .with_label_values(&["sink_attached"])
            .inc();
        warn!(session = %session.id(), error = %e, "Rejecting second consumer");
        return;
    }
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(session = %session.id(), "WebSocket client connected");

    let ingress = match ingress {
        Some(tx) => Ingress::Frames(tx),
        None => Ingress::Ignore,
    };
    receive(receiver, &session, ingress).await;

    // The API may have removed it already.
    let _ = state.sessions().remove(session.id());
    session.close();
    WS_CONNECTIONS_ACTIVE.dec();
    info!(session = %session.id(), "WebSocket client disconnected");
}

async fn receive(
    mut receiver: SplitStream<WebSocket>,
    session: &Arc<StreamingSession>,
    ingress: Ingress,
) {
    loop {
        let next = tokio::select! {
            _ = session.closed() => {
                debug!(session = %session.id(), "Session closed, dropping connection");
                return;
            }
            next = receiver.next() => next,
        };
        match next {
            Some(Ok(Message::Binary(bytes))) => match &ingress {
                Ingress::Frames(tx) => match decode_frame(&bytes) {
                    Ok(frame) => {
                        if tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        WS_REJECTED_MESSAGES
                            .with_label_values(&["undecodable_frame"])
                            .inc();
                        debug!(session = %session.id(), error = %e, "Dropping undecodable frame");
                    }
                },
                Ingress::Ignore => {
                    WS_REJECTED_MESSAGES
                        .with_label_values(&["unexpected_frame"])
                        .inc();
                }
            },
            Some(Ok(Message::Text(text))) => handle_command(session, text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => {
                debug!(session = %session.id(), "WebSocket client requested close");
                return;
            }
            Some(Ok(_)) => {
                // Ping/pong is handled by axum
            }
            Some(Err(e)) => {
                warn!(session = %session.id(), "WebSocket receive error: {}", e);
                return;
            }
        }
    }
}

async fn handle_command(session: &Arc<StreamingSession>, text: &str) {
    let Some(command) = ClientCommand::parse(text) else {
        WS_REJECTED_MESSAGES
            .with_label_values(&["unknown_command"])
            .inc();
        debug!(session = %session.id(), command = text, "Ignoring unknown command");
        return;
    };
    match command {
        ClientCommand::Seek(secs) => {
            if let Err(e) = session.seek_async(secs).await {
                WS_REJECTED_MESSAGES
                    .with_label_values(&["seek_failed"])
                    .inc();
                warn!(session = %session.id(), error = %e, "Seek rejected");
            }
        }
    }
}

/// `GET /stream/ws`: a live session fed by the client.
pub async fn live_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LiveStreamParams>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let sources = state.load_sources(&params.source_paths()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(format!("Failed to load sources: {}", e)),
        )
    })?;
    let options = session_options(&state, params.bitrate, params.buffer_size)?;

    let session = StreamingSession::new(options, state.pipeline(), sources, state.classifier());
    session.begin_negotiation();
    let (frames_tx, source) = ChannelSource::pair(INGEST_BUFFER);
    session.open(source).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(e.to_string()),
        )
    })?;
    state.sessions().insert(Arc::clone(&session));

    let id = session.id();
    let on_failure = Arc::clone(&state);
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(session = %id, "WebSocket upgrade failed: {}", e);
            let _ = on_failure.sessions().remove(id);
        })
        .on_upgrade(move |socket| serve_session(socket, state, session, Some(frames_tx)))
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seek_command() {
        assert_eq!(ClientCommand::parse("seek:12.5"), Some(ClientCommand::Seek(12.5)));
        assert_eq!(ClientCommand::parse(" seek: 3 "), Some(ClientCommand::Seek(3.0)));
        assert_eq!(ClientCommand::parse("seek:-1"), None);
        assert_eq!(ClientCommand::parse("seek:nan"), None);
        assert_eq!(ClientCommand::parse("seek:"), None);
        assert_eq!(ClientCommand::parse("pause"), None);
    }

    #[test]
    fn test_source_paths_split() {
        let params = LiveStreamParams {
            sources: Some("/a.png, /b.png,,".to_string()),
            ..LiveStreamParams::default()
        };
        assert_eq!(
            params.source_paths(),
            vec![PathBuf::from("/a.png"), PathBuf::from("/b.png")]
        );
        assert!(LiveStreamParams::default().source_paths().is_empty());
    }
}
