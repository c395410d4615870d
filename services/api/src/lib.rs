//! Live Relay API Library Crate
//!
//! This library contains the gateway that relays client audio to an upstream
//! live conversational session and streams the spoken answer back, together
//! with its configuration, shared state, and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;
