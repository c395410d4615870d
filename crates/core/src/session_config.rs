//! Upstream session parameters, resolved once and reused for every session.

use crate::grounding::RagCorpus;
use serde::Serialize;

pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16_000;

/// The modality the upstream model answers in.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Audio,
}

/// Everything needed to open an upstream conversational session.
///
/// The gateway treats this as opaque: it is handed to the session connector
/// unchanged for every client connection.
#[derive(Serialize, Clone, Debug)]
pub struct LiveSessionConfig {
    /// Model identifier, e.g. `gemini-2.0-flash-live-preview-04-09`.
    pub model: String,
    pub response_modality: ResponseModality,
    pub system_instruction: Option<String>,
    /// Retrieval corpus used as a grounding tool, when one was resolved.
    pub grounding: Option<RagCorpus>,
    /// Sample rate of the raw PCM the client streams in, shared by the whole connection.
    pub input_sample_rate: u32,
}

impl LiveSessionConfig {
    /// Creates an audio-in/audio-out configuration with no grounding.
    pub fn audio(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response_modality: ResponseModality::Audio,
            system_instruction: None,
            grounding: None,
            input_sample_rate: DEFAULT_INPUT_SAMPLE_RATE,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_grounding(mut self, corpus: Option<RagCorpus>) -> Self {
        self.grounding = corpus;
        self
    }

    pub fn with_input_sample_rate(mut self, rate: u32) -> Self {
        self.input_sample_rate = rate;
        self
    }

    /// The mime type tag attached to every audio payload sent upstream.
    pub fn input_mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.input_sample_rate)
    }
}
