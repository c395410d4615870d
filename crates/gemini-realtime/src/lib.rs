//! A minimal client for Gemini's bidirectional streaming ("Live") API.
//!
//! The client opens one WebSocket per session, performs the setup handshake,
//! and then exposes the session as an independent sender and receiver so that
//! audio can be streamed in while responses are drained concurrently.

pub mod client;
pub mod types;

pub use client::{Endpoint, LiveError, LiveReceiver, LiveSender, connect};
