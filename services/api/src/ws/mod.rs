//! WebSocket Voice Relay
//!
//! This module contains the core logic for relaying a client's audio stream to
//! an upstream live session and streaming the spoken response back. It is
//! structured into submodules:
//!
//! - `protocol`: Classifies inbound client messages and frames outbound ones.
//! - `manager`: Owns the one upstream session bound to each connection.
//! - `relay`: Drains one turn's response stream to the client.
//! - `session`: Manages the connection lifecycle, from accept to teardown.
//! - `provider`: The upstream session seam and its Gemini Live implementation.

pub mod manager;
pub mod protocol;
pub mod provider;
pub mod relay;
pub mod session;

pub use session::{ConnectionSummary, run_connection, ws_handler};
