//! WebSocket client for a bidirectional streaming session.

use crate::types::{Blob, ClientMessage, RealtimeInput, ServerMessage, Setup};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, Request, header::AUTHORIZATION},
        protocol::Message as WsMessage,
    },
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors produced by the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Invalid connection request: {0}")]
    InvalidRequest(String),
    #[error("Session setup failed: {0}")]
    Handshake(String),
    #[error("Failed to serialize client message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection closed by server: {0}")]
    Closed(String),
}

/// Where the bidirectional session is opened and how it authenticates.
#[derive(Clone, Debug)]
pub enum Endpoint {
    /// Vertex AI, authenticated with an OAuth bearer token.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
    /// The public Gemini API, authenticated with an API key.
    GeminiApi { api_key: String },
    /// Any other URL speaking the same protocol, unauthenticated.
    Custom { url: String },
}

impl Endpoint {
    pub fn url(&self) -> String {
        match self {
            Endpoint::Vertex { location, .. } => format!(
                "wss://{location}-aiplatform.googleapis.com/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent"
            ),
            Endpoint::GeminiApi { api_key } => format!(
                "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
                api_key
            ),
            Endpoint::Custom { url } => url.clone(),
        }
    }

    /// The fully qualified model name expected in the setup message.
    pub fn model_resource(&self, model: &str) -> String {
        if model.starts_with("projects/") || model.starts_with("models/") {
            return model.to_string();
        }
        match self {
            Endpoint::Vertex {
                project, location, ..
            } => format!("projects/{project}/locations/{location}/publishers/google/models/{model}"),
            Endpoint::GeminiApi { .. } | Endpoint::Custom { .. } => format!("models/{model}"),
        }
    }

    fn request(&self) -> Result<Request<()>, LiveError> {
        let mut request = self
            .url()
            .into_client_request()
            .map_err(|e| LiveError::InvalidRequest(e.to_string()))?;
        if let Endpoint::Vertex { access_token, .. } = self {
            let value = HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| LiveError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

/// Opens a session and completes the setup handshake.
///
/// Returns the two halves of the session once the server has acknowledged the
/// setup. Any other outcome (refused connection, server close, transport
/// error) is reported as an error and no session is returned.
pub async fn connect(endpoint: &Endpoint, setup: Setup) -> Result<(LiveSender, LiveReceiver), LiveError> {
    let (ws_stream, _) = connect_async(endpoint.request()?).await?;
    info!(model = %setup.model, "Connected to realtime endpoint. Sending setup.");
    let (mut sink, mut stream) = ws_stream.split();

    let setup_msg = serde_json::to_string(&ClientMessage::Setup(setup))?;
    sink.send(WsMessage::Text(setup_msg.into())).await?;

    loop {
        let Some(frame) = stream.next().await else {
            return Err(LiveError::Handshake(
                "stream ended before setup completed".to_string(),
            ));
        };
        let msg = match frame? {
            WsMessage::Text(text) => serde_json::from_str::<ServerMessage>(text.as_str()),
            WsMessage::Binary(data) => serde_json::from_slice::<ServerMessage>(&data),
            WsMessage::Close(frame) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_string())
                    .unwrap_or_default();
                return Err(LiveError::Handshake(format!(
                    "server closed during setup: {}",
                    reason
                )));
            }
            _ => continue,
        };
        match msg {
            Ok(msg) if msg.setup_complete.is_some() => break,
            Ok(other) => warn!(?other, "Unexpected message before setup completed."),
            Err(e) => warn!(error = %e, "Unparsable message before setup completed."),
        }
    }

    info!("Realtime session setup complete.");
    Ok((
        LiveSender { sink, closed: false },
        LiveReceiver { stream },
    ))
}

/// The sending half of a session.
pub struct LiveSender {
    sink: SplitSink<WsStream, WsMessage>,
    closed: bool,
}

impl LiveSender {
    /// Sends one chunk of raw audio. An empty chunk marks the end of input.
    pub async fn send_audio(&mut self, payload: &[u8], mime_type: &str) -> Result<(), LiveError> {
        if self.closed {
            return Err(LiveError::Closed("sender already closed".to_string()));
        }
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob::encode(payload, mime_type),
        });
        let serialized = serde_json::to_string(&msg)?;
        self.sink.send(WsMessage::Text(serialized.into())).await?;
        Ok(())
    }

    /// Sends a close frame. Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<(), LiveError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Closing realtime session.");
        self.sink.close().await?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The receiving half of a session.
pub struct LiveReceiver {
    stream: SplitStream<WsStream>,
}

impl LiveReceiver {
    /// Waits for the next server message.
    ///
    /// Returns `None` once the stream is exhausted. A close frame is reported
    /// as `LiveError::Closed`. Messages that fail to parse are skipped.
    pub async fn next_message(&mut self) -> Option<Result<ServerMessage, LiveError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            let parsed = match frame {
                WsMessage::Text(text) => serde_json::from_str::<ServerMessage>(text.as_str()),
                WsMessage::Binary(data) => serde_json::from_slice::<ServerMessage>(&data),
                WsMessage::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Some(Err(LiveError::Closed(reason)));
                }
                _ => continue,
            };
            match parsed {
                Ok(msg) => {
                    if let Some(go_away) = &msg.go_away {
                        warn!(time_left = ?go_away.time_left, "Server announced it will disconnect soon.");
                    }
                    return Some(Ok(msg));
                }
                Err(e) => warn!(error = %e, "Skipping unparsable server message."),
            }
        }
    }
}
