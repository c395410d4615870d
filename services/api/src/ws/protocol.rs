//! Defines the WebSocket message protocol between the client and the gateway.
//!
//! Inbound binary frames are raw PCM audio; inbound text is reserved for
//! control sentinels. Outbound binary frames are raw response audio; outbound
//! text is the end-of-turn sentinel.

use axum::extract::ws::Message;
use bytes::Bytes;

/// Text sent by the client when it stops recording, ending its input for a turn.
pub const STOP_RECORDING: &str = "STOP_RECORDING";

/// Text sent to the client after the last audio fragment of a turn.
pub const TURN_COMPLETE: &str = "TURN_COMPLETE";

/// A control signal from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The client has finished speaking for this turn.
    StopRecording,
    /// The transport was closed by the client.
    Disconnect,
}

/// One chunk of raw client audio. The sample format is fixed for the whole connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame(pub Bytes);

/// Messages received from the client, after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Audio(AudioFrame),
    Control(ControlSignal),
    /// Text that is not a known sentinel.
    Unrecognized(String),
    /// Transport-level ping/pong traffic with no meaning to the session.
    Keepalive,
}

impl ClientMessage {
    /// Classifies one inbound WebSocket message.
    pub fn interpret(message: Message) -> Self {
        match message {
            Message::Binary(data) => ClientMessage::Audio(AudioFrame(data)),
            Message::Text(text) if text.as_str() == STOP_RECORDING => {
                ClientMessage::Control(ControlSignal::StopRecording)
            }
            Message::Text(text) => ClientMessage::Unrecognized(text.as_str().to_owned()),
            Message::Close(_) => ClientMessage::Control(ControlSignal::Disconnect),
            Message::Ping(_) | Message::Pong(_) => ClientMessage::Keepalive,
        }
    }

    /// The classification of the inbound stream ending without a close frame.
    pub fn end_of_stream() -> Self {
        ClientMessage::Control(ControlSignal::Disconnect)
    }
}

/// Messages sent from the gateway to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// One upstream response fragment's payload, forwarded verbatim.
    Audio(Bytes),
    /// Marks the end of a completed turn.
    TurnComplete,
}

impl From<ServerMessage> for Message {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Audio(data) => Message::Binary(data),
            ServerMessage::TurnComplete => Message::Text(TURN_COMPLETE.into()),
        }
    }
}
