use gemini_realtime::Endpoint;
use live_relay_core::{GroundingMode, LiveSessionConfig, RagCorpus, VertexRagCatalog};
use std::net::SocketAddr;
use tracing::Level;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-live-preview-04-09";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. Answer the user's spoken questions concisely, using the retrieved documents when they are relevant.";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The upstream service hosting the live model, with its credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Vertex AI. The only backend that supports retrieval grounding.
    Vertex {
        project: String,
        access_token: String,
    },
    /// The Gemini API, authenticated with an API key.
    Gemini { api_key: String },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Vertex { .. } => "vertex",
            Backend::Gemini { .. } => "gemini",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend: Backend,
    pub location: String,
    pub live_model: String,
    pub input_sample_rate: u32,
    pub system_instruction: String,
    pub rag_mode: GroundingMode,
    pub rag_corpus: Option<String>,
    pub log_level: Level,
}

fn required_var(name: &str, reason: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(format!("{} must be set {}", name, reason)))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let backend_str = std::env::var("LIVE_BACKEND").unwrap_or_else(|_| "vertex".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "vertex" => Backend::Vertex {
                project: required_var("GCP_PROJECT_ID", "for the 'vertex' backend")?,
                access_token: required_var("GOOGLE_ACCESS_TOKEN", "for the 'vertex' backend")?,
            },
            "gemini" => Backend::Gemini {
                api_key: required_var("GEMINI_API_KEY", "for the 'gemini' backend")?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "LIVE_BACKEND".to_string(),
                    format!("'{}' is not one of 'vertex', 'gemini'", other),
                ));
            }
        };

        let location = std::env::var("GCP_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
        let live_model = std::env::var("LIVE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let rate_str = std::env::var("INPUT_SAMPLE_RATE").unwrap_or_else(|_| "16000".to_string());
        let input_sample_rate = rate_str
            .parse::<u32>()
            .ok()
            .filter(|rate| *rate > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "INPUT_SAMPLE_RATE".to_string(),
                    format!("'{}' is not a positive integer", rate_str),
                )
            })?;

        let system_instruction = std::env::var("SYSTEM_INSTRUCTION")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        let rag_mode = std::env::var("RAG_MODE")
            .unwrap_or_else(|_| "required".to_string())
            .parse::<GroundingMode>()
            .map_err(|e| ConfigError::InvalidValue("RAG_MODE".to_string(), e))?;
        let rag_corpus = std::env::var("RAG_CORPUS")
            .ok()
            .filter(|v| !v.trim().is_empty());

        if let Backend::Gemini { .. } = backend {
            if rag_mode == GroundingMode::Required || rag_corpus.is_some() {
                return Err(ConfigError::InvalidValue(
                    "RAG_MODE".to_string(),
                    "retrieval grounding requires the 'vertex' backend; set RAG_MODE=disabled"
                        .to_string(),
                ));
            }
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            backend,
            location,
            live_model,
            input_sample_rate,
            system_instruction,
            rag_mode,
            rag_corpus,
            log_level,
        })
    }

    /// The grounding policy actually applied. The Gemini backend has no
    /// corpus catalog, so grounding is always off there.
    pub fn grounding_mode(&self) -> GroundingMode {
        match self.backend {
            Backend::Vertex { .. } => self.rag_mode,
            Backend::Gemini { .. } => GroundingMode::Disabled,
        }
    }

    /// The catalog used to discover retrieval corpora, when the backend has one.
    pub fn corpus_catalog(&self) -> Option<VertexRagCatalog> {
        match &self.backend {
            Backend::Vertex {
                project,
                access_token,
            } => Some(VertexRagCatalog::new(
                project,
                &self.location,
                access_token.clone(),
            )),
            Backend::Gemini { .. } => None,
        }
    }

    /// The realtime endpoint every upstream session connects to.
    pub fn endpoint(&self) -> Endpoint {
        match &self.backend {
            Backend::Vertex {
                project,
                access_token,
            } => Endpoint::Vertex {
                project: project.clone(),
                location: self.location.clone(),
                access_token: access_token.clone(),
            },
            Backend::Gemini { api_key } => Endpoint::GeminiApi {
                api_key: api_key.clone(),
            },
        }
    }

    /// Builds the per-session configuration once grounding has been resolved.
    pub fn session_config(&self, grounding: Option<RagCorpus>) -> LiveSessionConfig {
        LiveSessionConfig::audio(self.live_model.clone())
            .with_system_instruction(self.system_instruction.clone())
            .with_input_sample_rate(self.input_sample_rate)
            .with_grounding(grounding)
    }
}
