//! Shared fixtures for gateway tests: a scripted upstream service and helpers
//! for driving a connection over in-memory channels.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{
    StreamExt,
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
};
use live_relay_api::{
    state::AppState,
    ws::{
        ConnectionSummary,
        protocol::{STOP_RECORDING, TURN_COMPLETE},
        provider::{
            ResponseFragment, SessionConnector, SessionError, UpstreamSession, UpstreamSink,
            UpstreamSource,
        },
        run_connection,
    },
};
use live_relay_core::LiveSessionConfig;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// Everything the upstream service observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Audio(Vec<u8>),
    Flush,
    /// A relay asked for the next response fragment.
    Recv,
    Closed,
}

/// One scripted response from the upstream service.
#[derive(Debug)]
pub enum Step {
    Fragment(ResponseFragment),
    Fault(String),
    End,
}

pub fn audio(bytes: &[u8]) -> Step {
    Step::Fragment(ResponseFragment::audio(bytes.to_vec()))
}

pub fn complete() -> Step {
    Step::Fragment(ResponseFragment::turn_complete())
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// An upstream service that replays a fixed script of responses and records
/// every call it receives. Once the script runs out, reads never resolve.
pub struct ScriptedConnector {
    pub events: EventLog,
    script: Arc<Mutex<VecDeque<Step>>>,
    fail_with: Option<String>,
    opens: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            events: Arc::default(),
            script: Arc::new(Mutex::new(script.into())),
            fail_with: None,
            opens: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            events: Arc::default(),
            script: Arc::default(),
            fail_with: Some(reason.to_string()),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The upstream log without relay reads.
    pub fn sent(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| *e != Event::Recv)
            .collect()
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn open(&self, _config: &LiveSessionConfig) -> Result<UpstreamSession, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_with {
            return Err(SessionError::ConnectFailure(reason.clone()));
        }
        Ok(UpstreamSession {
            sink: Box::new(ScriptedSink {
                events: self.events.clone(),
            }),
            source: Box::new(ScriptedSource {
                events: self.events.clone(),
                script: self.script.clone(),
            }),
        })
    }
}

struct ScriptedSink {
    events: EventLog,
}

#[async_trait]
impl UpstreamSink for ScriptedSink {
    async fn send_realtime(&mut self, payload: Bytes, mime_type: &str) -> Result<(), SessionError> {
        assert_eq!(mime_type, "audio/pcm;rate=16000");
        let event = if payload.is_empty() {
            Event::Flush
        } else {
            Event::Audio(payload.to_vec())
        };
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.events.lock().unwrap().push(Event::Closed);
        Ok(())
    }
}

struct ScriptedSource {
    events: EventLog,
    script: Arc<Mutex<VecDeque<Step>>>,
}

#[async_trait]
impl UpstreamSource for ScriptedSource {
    async fn next_fragment(&mut self) -> Option<Result<ResponseFragment, SessionError>> {
        self.events.lock().unwrap().push(Event::Recv);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Fragment(fragment)) => Some(Ok(fragment)),
            Some(Step::Fault(reason)) => Some(Err(SessionError::StreamFault(reason))),
            Some(Step::End) => None,
            None => std::future::pending().await,
        }
    }
}

/// The client side of a connection driven over in-memory channels.
pub struct Client {
    pub inbound: UnboundedSender<Result<Message, std::io::Error>>,
    pub outbound: UnboundedReceiver<Message>,
    pub handle: JoinHandle<Result<ConnectionSummary, SessionError>>,
}

impl Client {
    pub fn connect(connector: Arc<ScriptedConnector>) -> Self {
        let state = Arc::new(AppState::new(
            connector,
            LiveSessionConfig::audio("test-model"),
        ));
        let (inbound, client_rx) = unbounded();
        let (client_tx, outbound) = unbounded();
        let handle = tokio::spawn(run_connection(state, client_tx, client_rx));
        Self {
            inbound,
            outbound,
            handle,
        }
    }

    pub fn send(&self, msg: Message) {
        self.inbound.unbounded_send(Ok(msg)).unwrap();
    }

    pub fn audio(&self, bytes: &[u8]) {
        self.send(Message::Binary(Bytes::copy_from_slice(bytes)));
    }

    pub fn stop(&self) {
        self.send(Message::Text(STOP_RECORDING.into()));
    }

    pub async fn recv(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.outbound.next())
            .await
            .expect("timed out waiting for an outbound message")
            .expect("outbound channel closed")
    }

    /// Collects outbound messages up to and including the next turn sentinel.
    pub async fn recv_turn(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await;
            let done = msg == Message::Text(TURN_COMPLETE.into());
            messages.push(msg);
            if done {
                return messages;
            }
        }
    }

    /// Ends the client stream and waits for the connection to tear down.
    pub async fn disconnect(self) -> ConnectionSummary {
        let Client {
            inbound, handle, ..
        } = self;
        drop(inbound);
        tokio::time::timeout(WAIT, handle)
            .await
            .expect("connection did not tear down")
            .expect("connection task panicked")
            .expect("connection failed")
    }
}

pub fn binary(bytes: &[u8]) -> Message {
    Message::Binary(Bytes::copy_from_slice(bytes))
}

pub fn turn_complete() -> Message {
    Message::Text(TURN_COMPLETE.into())
}

/// Polls `condition` until it holds or the wait budget runs out.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
