use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, warn};

use crate::handlers::types::ComposedResponse;
use crate::services::audio_cache::AudioCache;
use crate::state::ReplaySlot;
use crate::traits::TtsTrait;

/// Error text surfaced when the audio path fails. The text answer is still
/// delivered.
pub const AUDIO_FAILURE_MESSAGE: &str = "Failed to generate audio";

/// Turns an agent answer into the wire-ready `{text, audio?}` payload.
/// Decides whether to synthesize, retains the artifact, and base64-encodes
/// the bytes for transport. The cache entry is side retention for replay;
/// the wire payload carries the encoded bytes directly.
pub struct ResponseComposer {
    tts: Arc<dyn TtsTrait + Send + Sync>,
    cache: Arc<AudioCache>,
    replay: ReplaySlot,
}

impl ResponseComposer {
    pub fn new(
        tts: Arc<dyn TtsTrait + Send + Sync>,
        cache: Arc<AudioCache>,
        replay: ReplaySlot,
    ) -> Self {
        Self { tts, cache, replay }
    }

    pub async fn compose(&self, text: String, tts_enabled: bool, voice: &str) -> ComposedResponse {
        // Empty text never reaches the synthesizer.
        if !tts_enabled || text.is_empty() {
            return ComposedResponse::text_only(text);
        }

        let bytes = match self.tts.synthesize(&text, voice).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Speech synthesis failed: {:#}", e);
                return ComposedResponse {
                    text,
                    audio: None,
                    error: Some(AUDIO_FAILURE_MESSAGE.to_string()),
                };
            }
        };

        let handle = match self.cache.put(&bytes) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to persist audio artifact: {:#}", e);
                return ComposedResponse {
                    text,
                    audio: None,
                    error: Some(AUDIO_FAILURE_MESSAGE.to_string()),
                };
            }
        };
        for failure in self.cache.sweep_excess() {
            warn!(
                "Eviction left {} behind: {}",
                failure.path.display(),
                failure.reason
            );
        }
        debug!("Composed response with audio artifact {}", handle.id);

        let encoded = general_purpose::STANDARD.encode(&bytes);
        self.replay.store(encoded.clone());

        ComposedResponse {
            text,
            audio: Some(encoded),
            error: None,
        }
    }
}
