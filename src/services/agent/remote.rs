use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::traits::AgentTrait;

/// Client for the external reasoning agent service. The service owns the
/// actual LLM/search orchestration; this adapter only ships the request over
/// and pulls the answer text back.
pub struct RemoteAgent {
    url: String,
    api_key: String,
    client: Client,
}

impl RemoteAgent {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl AgentTrait for RemoteAgent {
    async fn generate_answer(
        &self,
        model_name: &str,
        model_provider: &str,
        system_prompt: &str,
        messages: &[String],
        allow_search: bool,
    ) -> Result<String> {
        let body = json!({
            "model_name": model_name,
            "model_provider": model_provider,
            "system_prompt": system_prompt,
            "messages": messages,
            "allow_search": allow_search,
        });

        info!(
            "Requesting answer from agent service: model={} provider={}",
            model_name, model_provider
        );

        let mut request = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(30));
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = request
            .send()
            .await
            .context("Failed to send request to agent service")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Agent service error ({}): {}",
                status,
                error_text
            ));
        }

        let json: Value = resp
            .json()
            .await
            .context("Failed to parse agent service response")?;

        // The service replies either {"text": "..."} or a bare string.
        let text = match &json {
            Value::String(s) => s.clone(),
            _ => json["text"]
                .as_str()
                .context("Agent service response missing text")?
                .to_string(),
        };

        info!("Agent answered with {} chars", text.len());
        Ok(text)
    }
}
