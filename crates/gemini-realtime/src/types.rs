//! Wire types for the bidirectional content generation protocol.
//!
//! Only the subset of the protocol needed for audio-in/audio-out sessions with
//! an optional retrieval tool is modelled here.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

// --- Client -> server ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Serialize, Debug, Clone)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Tool {
    pub retrieval: Retrieval,
}

impl Tool {
    /// A retrieval tool grounded on a single corpus.
    pub fn rag_corpus(corpus: impl Into<String>) -> Self {
        Self {
            retrieval: Retrieval {
                vertex_rag_store: VertexRagStore {
                    rag_resources: vec![RagResource {
                        rag_corpus: corpus.into(),
                    }],
                },
            },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Retrieval {
    pub vertex_rag_store: VertexRagStore,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VertexRagStore {
    pub rag_resources: Vec<RagResource>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RagResource {
    pub rag_corpus: String,
}

#[derive(Serialize, Debug)]
pub struct RealtimeInput {
    pub audio: Blob,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 encoded payload. Empty for an end-of-input marker.
    pub data: String,
}

impl Blob {
    pub fn encode(payload: &[u8], mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(payload),
        }
    }
}

// --- Server -> client ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub go_away: Option<GoAway>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

impl ServerContent {
    pub fn is_turn_complete(&self) -> bool {
        self.turn_complete == Some(true)
    }

    /// Decodes every non-empty inline audio part, in part order.
    pub fn audio_payloads(&self) -> Result<Vec<Vec<u8>>, base64::DecodeError> {
        let Some(turn) = &self.model_turn else {
            return Ok(Vec::new());
        };
        turn.parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|blob| !blob.data.is_empty())
            .map(|blob| STANDARD.decode(&blob.data))
            .collect()
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serialization_with_retrieval_tool() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/live".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
            },
            system_instruction: Some(Content::text("You are helpful.")),
            tools: vec![Tool::rag_corpus("projects/p/locations/l/ragCorpora/1")],
        });

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/live",
                    "generationConfig": { "responseModalities": ["AUDIO"] },
                    "systemInstruction": { "parts": [{ "text": "You are helpful." }] },
                    "tools": [{
                        "retrieval": {
                            "vertexRagStore": {
                                "ragResources": [{ "ragCorpus": "projects/p/locations/l/ragCorpora/1" }]
                            }
                        }
                    }]
                }
            })
        );
    }

    #[test]
    fn test_setup_omits_empty_optional_fields() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/live".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Text],
            },
            system_instruction: None,
            tools: vec![],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value["setup"].get("tools").is_none());
        assert!(value["setup"].get("systemInstruction").is_none());
    }

    #[test]
    fn test_empty_blob_marks_end_of_input() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob::encode(&[], "audio/pcm;rate=16000"),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({ "realtimeInput": { "audio": { "mimeType": "audio/pcm;rate=16000", "data": "" } } })
        );
    }

    #[test]
    fn test_server_content_audio_payloads() {
        let encoded_a = STANDARD.encode([1u8, 2, 3]);
        let encoded_b = STANDARD.encode([4u8]);
        let raw = json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": encoded_a } },
                        { "text": "thinking" },
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "" } },
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": encoded_b } }
                    ]
                }
            }
        });

        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert!(!content.is_turn_complete());
        assert_eq!(content.audio_payloads().unwrap(), vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_turn_complete_and_setup_complete_parsing() {
        let done: ServerMessage =
            serde_json::from_str(r#"{"serverContent":{"turnComplete":true}}"#).unwrap();
        let content = done.server_content.unwrap();
        assert!(content.is_turn_complete());
        assert!(content.audio_payloads().unwrap().is_empty());

        let ready: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(ready.setup_complete.is_some());
        assert!(ready.server_content.is_none());
    }

    #[test]
    fn test_invalid_inline_data_is_reported() {
        let raw = json!({
            "serverContent": { "modelTurn": { "parts": [ { "inlineData": { "data": "not base64!" } } ] } }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert!(msg.server_content.unwrap().audio_payloads().is_err());
    }
}
