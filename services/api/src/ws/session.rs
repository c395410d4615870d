//! Manages the WebSocket connection lifecycle for a relayed voice session.

use super::{
    manager::SessionManager,
    protocol::{ClientMessage, ControlSignal},
    provider::SessionError,
    relay::{ClientSink, TurnOutcome, relay_turn},
};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::{fmt::Display, sync::Arc};
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

/// Longest close reason allowed in a close frame.
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Lifecycle of a single client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepting,
    Active,
    Closing,
    Closed,
}

/// Why the read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the transport.
    ClientDisconnect,
    /// Reading from the client failed.
    Transport(String),
    /// Sending into the upstream session failed.
    Upstream(String),
}

/// What happened over the life of an accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub connection_id: Uuid,
    /// Number of turns whose input was flushed upstream.
    pub turns: u64,
    pub reason: CloseReason,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (socket_tx, socket_rx) = socket.split();
    if let Ok(summary) = run_connection(state, socket_tx, socket_rx).await {
        debug!(?summary, "Connection finished.");
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    info!(from = ?*state, to = ?next, "Connection state change.");
    *state = next;
}

/// Drives one client connection from accept to teardown.
///
/// Opens the upstream session, then forwards client audio into it until the
/// client goes away. Each stop signal flushes the turn upstream and spawns a
/// relay for its response; the read loop does not wait for relays to finish.
///
/// Returns an error only if the upstream session could not be opened, in which
/// case the client has been sent a close frame carrying the cause.
#[instrument(name = "connection", skip_all, fields(connection_id))]
pub async fn run_connection<S, R, E>(
    state: Arc<AppState>,
    client_tx: S,
    mut client_rx: R,
) -> Result<ConnectionSummary, SessionError>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display,
{
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));
    let mut conn_state = ConnectionState::Accepting;
    info!("New WebSocket connection. Opening upstream session...");

    let client_tx: ClientSink<S> = Arc::new(Mutex::new(client_tx));

    let mut manager =
        match SessionManager::open(state.connector.as_ref(), &state.session_config).await {
            Ok(manager) => manager,
            Err(e) => {
                error!(error = %e, "Upstream session could not be opened. Rejecting connection.");
                reject(&client_tx, &e).await;
                transition(&mut conn_state, ConnectionState::Closed);
                return Err(e);
            }
        };
    transition(&mut conn_state, ConnectionState::Active);

    let mut relays: JoinSet<TurnOutcome> = JoinSet::new();
    let mut turns: u64 = 0;

    let reason = loop {
        let inbound = match client_rx.next().await {
            Some(Ok(msg)) => ClientMessage::interpret(msg),
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving from client WebSocket.");
                break CloseReason::Transport(e.to_string());
            }
            None => ClientMessage::end_of_stream(),
        };
        reap_finished(&mut relays);

        match inbound {
            ClientMessage::Audio(frame) => {
                if let Err(e) = manager.send_audio(frame).await {
                    error!(error = %e, "Failed to forward audio upstream.");
                    break CloseReason::Upstream(e.to_string());
                }
            }
            ClientMessage::Control(ControlSignal::StopRecording) => {
                if let Err(e) = manager.flush_turn().await {
                    error!(error = %e, "Failed to send end-of-turn signal upstream.");
                    break CloseReason::Upstream(e.to_string());
                }
                turns += 1;
                info!(turn = turns, "Client stopped recording. Spawning turn relay.");
                relays.spawn(
                    relay_turn(turns, manager.response_stream(), client_tx.clone())
                        .instrument(info_span!("turn_relay", turn = turns)),
                );
            }
            ClientMessage::Control(ControlSignal::Disconnect) => {
                info!("Client disconnected.");
                break CloseReason::ClientDisconnect;
            }
            ClientMessage::Unrecognized(text) => {
                warn!(message = %text, "Ignoring unrecognized text message.");
            }
            ClientMessage::Keepalive => {}
        }
    };

    transition(&mut conn_state, ConnectionState::Closing);
    relays.abort_all();
    while let Some(result) = relays.join_next().await {
        log_relay_result(result);
    }
    manager.close().await;
    transition(&mut conn_state, ConnectionState::Closed);

    Ok(ConnectionSummary {
        connection_id,
        turns,
        reason,
    })
}

/// Collects relays that have already finished so their handles do not pile up.
fn reap_finished(relays: &mut JoinSet<TurnOutcome>) {
    while let Some(result) = relays.try_join_next() {
        log_relay_result(result);
    }
}

fn log_relay_result(result: Result<TurnOutcome, tokio::task::JoinError>) {
    match result {
        Ok(outcome) => debug!(?outcome, "Turn relay finished."),
        Err(e) if e.is_cancelled() => debug!("Turn relay cancelled."),
        Err(e) => error!(error = %e, "Turn relay panicked."),
    }
}

/// Tells the client why its connection is being refused, if the transport still allows it.
async fn reject<S>(client_tx: &ClientSink<S>, cause: &SessionError)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut reason = cause.to_string();
    if reason.len() > MAX_CLOSE_REASON_BYTES {
        let mut cut = MAX_CLOSE_REASON_BYTES;
        while !reason.is_char_boundary(cut) {
            cut -= 1;
        }
        reason.truncate(cut);
    }
    let frame = CloseFrame {
        code: close_code::ERROR,
        reason: reason.into(),
    };
    let mut sink = client_tx.lock().await;
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Could not deliver close frame to client.");
    }
}
