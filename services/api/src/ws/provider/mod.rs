//! The seam between the gateway and the upstream conversational service.
//!
//! A session is opened through a `SessionConnector` and handed back as two
//! independent halves: an `UpstreamSink` that the read loop pushes audio into,
//! and an `UpstreamSource` that turn relays drain responses from.

pub mod gemini;

use async_trait::async_trait;
use bytes::Bytes;
use live_relay_core::LiveSessionConfig;

/// Errors raised by an upstream session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session could not be opened for this connection.
    #[error("Failed to open upstream session: {0}")]
    ConnectFailure(String),
    #[error("Failed to send to upstream session: {0}")]
    Send(String),
    /// The response stream broke while a turn was being drained.
    #[error("Upstream stream fault: {0}")]
    StreamFault(String),
    #[error("Upstream session is closed")]
    Closed,
}

/// One unit of the upstream response stream.
///
/// A fragment carries zero or more audio payloads, in stream order, and may
/// also mark the end of the current turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFragment {
    pub audio: Vec<Bytes>,
    pub turn_complete: bool,
}

impl ResponseFragment {
    pub fn audio(payload: impl Into<Bytes>) -> Self {
        Self {
            audio: vec![payload.into()],
            turn_complete: false,
        }
    }

    pub fn turn_complete() -> Self {
        Self {
            audio: Vec::new(),
            turn_complete: true,
        }
    }
}

/// An opened upstream session, split into its two halves.
pub struct UpstreamSession {
    pub sink: Box<dyn UpstreamSink>,
    pub source: Box<dyn UpstreamSource>,
}

/// Opens upstream sessions. One instance is shared by every connection.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, config: &LiveSessionConfig) -> Result<UpstreamSession, SessionError>;
}

/// The input side of an upstream session.
#[async_trait]
pub trait UpstreamSink: Send {
    /// Sends one realtime payload tagged with `mime_type`. An empty payload
    /// signals that the client's input for the current turn has ended.
    async fn send_realtime(&mut self, payload: Bytes, mime_type: &str) -> Result<(), SessionError>;

    /// Releases the session. Must tolerate being called more than once.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// The response side of an upstream session.
#[async_trait]
pub trait UpstreamSource: Send {
    /// Waits for the next response fragment. `None` means the stream is gone.
    async fn next_fragment(&mut self) -> Option<Result<ResponseFragment, SessionError>>;
}
