//! Drains one turn's upstream response stream to the client.

use super::{manager::SharedSource, protocol::ServerMessage};
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use std::{fmt::Display, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The client's outbound half, shared by the read loop and every turn relay.
/// Holding the lock for a whole `send` keeps messages from interleaving.
pub type ClientSink<S> = Arc<Mutex<S>>;

/// How a turn relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The completion marker arrived and the sentinel was sent.
    Completed { payloads: usize },
    /// The upstream stream errored or ended before the turn completed.
    Faulted,
    /// The client could no longer be written to.
    ClientGone,
}

/// Serializes and sends a `ServerMessage` to the client.
pub(crate) async fn send_msg<S>(client_tx: &ClientSink<S>, msg: ServerMessage) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    let msg: Message = msg.into();
    let mut sink = client_tx.lock().await;
    sink.send(msg).await
}

/// Drains fragments for turn `turn` until the completion marker arrives.
///
/// Every audio payload is forwarded as its own binary message, in stream order.
/// Faults end the relay but never the connection.
pub async fn relay_turn<S>(turn: u64, source: SharedSource, client_tx: ClientSink<S>) -> TurnOutcome
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    let mut source = source.lock().await;
    info!(turn, "Draining upstream response.");
    let mut payloads = 0usize;

    loop {
        let fragment = match source.next_fragment().await {
            Some(Ok(fragment)) => fragment,
            Some(Err(e)) => {
                error!(turn, error = %e, "Error in turn relay. Connection stays open.");
                return TurnOutcome::Faulted;
            }
            None => {
                error!(turn, "Upstream stream ended before the turn completed.");
                return TurnOutcome::Faulted;
            }
        };

        for payload in fragment.audio {
            if let Err(e) = send_msg(&client_tx, ServerMessage::Audio(payload)).await {
                warn!(turn, error = %e, "Failed to forward audio to client.");
                return TurnOutcome::ClientGone;
            }
            payloads += 1;
        }

        if fragment.turn_complete {
            if let Err(e) = send_msg(&client_tx, ServerMessage::TurnComplete).await {
                warn!(turn, error = %e, "Failed to send turn completion to client.");
                return TurnOutcome::ClientGone;
            }
            info!(turn, payloads, "Turn complete.");
            return TurnOutcome::Completed { payloads };
        }
    }
}
