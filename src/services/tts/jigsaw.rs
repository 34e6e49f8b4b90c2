use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

use crate::traits::TtsTrait;

/// JigsawStack text-to-speech adapter. One POST per synthesis, MP3 bytes
/// back; nothing is streamed or retained on the remote side.
pub struct JigsawTts {
    url: String,
    api_key: String,
    client: Client,
}

impl JigsawTts {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl TtsTrait for JigsawTts {
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Vec<u8>> {
        if text.trim().is_empty() {
            anyhow::bail!("Refusing to synthesize empty text");
        }

        info!(
            "Synthesizing {} chars of text with voice '{}'",
            text.len(),
            voice
        );

        let body = json!({
            "text": text,
            "accent": voice,
        });

        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send request to TTS service")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            error!("TTS service error ({}): {}", status, error_text);
            return Err(anyhow::anyhow!("TTS service error: {}", status));
        }

        let bytes = resp
            .bytes()
            .await
            .context("Failed to read TTS response body")?;

        info!("Received {} bytes of MP3 audio", bytes.len());
        Ok(bytes.to_vec())
    }
}
