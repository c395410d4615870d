//! Shared building blocks for the live relay gateway.
//!
//! Everything here is resolved once at process startup and then shared,
//! read-only, by every client connection.

pub mod grounding;
pub mod session_config;

pub use grounding::{
    CorpusCatalog, GroundingError, GroundingMode, RagCorpus, VertexRagCatalog, resolve_grounding,
};
pub use session_config::{LiveSessionConfig, ResponseModality};
