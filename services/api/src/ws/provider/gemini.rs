//! Gemini Live implementation of the upstream session seam.

use super::{
    ResponseFragment, SessionConnector, SessionError, UpstreamSession, UpstreamSink,
    UpstreamSource,
};
use async_trait::async_trait;
use bytes::Bytes;
use gemini_realtime::{
    Endpoint, LiveReceiver, LiveSender,
    types::{Content, GenerationConfig, Modality, Setup, Tool},
};
use live_relay_core::{LiveSessionConfig, ResponseModality};
use tracing::{debug, info};

/// Opens one Gemini Live session per client connection.
pub struct GeminiConnector {
    endpoint: Endpoint,
}

impl GeminiConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

/// Translates the session configuration into the setup message.
fn build_setup(endpoint: &Endpoint, config: &LiveSessionConfig) -> Setup {
    let modality = match config.response_modality {
        ResponseModality::Audio => Modality::Audio,
        ResponseModality::Text => Modality::Text,
    };
    Setup {
        model: endpoint.model_resource(&config.model),
        generation_config: GenerationConfig {
            response_modalities: vec![modality],
        },
        system_instruction: config.system_instruction.as_deref().map(Content::text),
        tools: config
            .grounding
            .iter()
            .map(|corpus| Tool::rag_corpus(corpus.name.clone()))
            .collect(),
    }
}

#[async_trait]
impl SessionConnector for GeminiConnector {
    async fn open(&self, config: &LiveSessionConfig) -> Result<UpstreamSession, SessionError> {
        let setup = build_setup(&self.endpoint, config);
        let (sender, receiver) = gemini_realtime::connect(&self.endpoint, setup)
            .await
            .map_err(|e| SessionError::ConnectFailure(e.to_string()))?;
        info!(grounded = config.grounding.is_some(), "Gemini Live session started.");
        Ok(UpstreamSession {
            sink: Box::new(GeminiSink { sender }),
            source: Box::new(GeminiSource { receiver }),
        })
    }
}

struct GeminiSink {
    sender: LiveSender,
}

#[async_trait]
impl UpstreamSink for GeminiSink {
    async fn send_realtime(&mut self, payload: Bytes, mime_type: &str) -> Result<(), SessionError> {
        if self.sender.is_closed() {
            return Err(SessionError::Closed);
        }
        self.sender
            .send_audio(&payload, mime_type)
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.sender
            .close()
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }
}

struct GeminiSource {
    receiver: LiveReceiver,
}

#[async_trait]
impl UpstreamSource for GeminiSource {
    async fn next_fragment(&mut self) -> Option<Result<ResponseFragment, SessionError>> {
        loop {
            let msg = match self.receiver.next_message().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(SessionError::StreamFault(e.to_string()))),
            };
            let Some(content) = msg.server_content else {
                continue;
            };
            if content.interrupted == Some(true) {
                debug!("Upstream reported the model turn was interrupted.");
            }
            let audio = match content.audio_payloads() {
                Ok(payloads) => payloads.into_iter().map(Bytes::from).collect::<Vec<_>>(),
                Err(e) => {
                    return Some(Err(SessionError::StreamFault(format!(
                        "invalid inline audio: {}",
                        e
                    ))));
                }
            };
            let turn_complete = content.is_turn_complete();
            if audio.is_empty() && !turn_complete {
                continue;
            }
            return Some(Ok(ResponseFragment {
                audio,
                turn_complete,
            }));
        }
    }
}
