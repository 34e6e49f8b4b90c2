use serde::{Deserialize, Serialize};

fn default_voice() -> String {
    "en-SG-female-1".to_string()
}

/// Inbound body for `POST /chat`. Immutable for the duration of the call.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub model_name: String,
    pub model_provider: String,
    #[serde(default)]
    pub system_prompt: String,
    pub messages: Vec<String>,
    #[serde(default)]
    pub allow_search: bool,
    #[serde(default)]
    pub tts_enabled: bool,
    #[serde(default = "default_voice")]
    pub voice_name: String,
}

/// Inbound body for `POST /tts`.
#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

/// Inbound body for `POST /whatsapp`. The persona, model, and voice are
/// server configuration; the caller only supplies the claim to check.
#[derive(Debug, Deserialize)]
pub struct WhatsappRequest {
    pub text: String,
}

/// The one response shape every channel delivers. A successful call carries
/// `text` plus optional base64 audio; an audio-path failure carries the same
/// `text` with an `error` alongside it (degrade, don't abort).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub text: String,
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComposedResponse {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            audio: None,
            error: None,
        }
    }
}

/// Status code of the downstream webhook call, the only thing the
/// forwarder reports back.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub status: u16,
}
