use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tracing::error;

use crate::handlers::types::{ChatRequest, DeliveryReceipt, TtsRequest, WhatsappRequest};
use crate::services::composer::AUDIO_FAILURE_MESSAGE;
use crate::services::gate::INVALID_MODEL_MESSAGE;
use crate::state::AppState;

/// `POST /chat` — gate, agent, composer, in that order. Application-level
/// outcomes (gate rejection, upstream failure) are reported in the body with
/// status 200; non-200 is reserved for transport problems.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if state.gate.validate(&req.model_name).is_err() {
        return Json(json!({ "error": INVALID_MODEL_MESSAGE })).into_response();
    }

    let text = match state
        .agent
        .generate_answer(
            &req.model_name,
            &req.model_provider,
            &req.system_prompt,
            &req.messages,
            req.allow_search,
        )
        .await
    {
        Ok(text) => text,
        Err(e) => {
            error!("Agent call failed: {:#}", e);
            return Json(json!({ "error": "Failed to generate a response" })).into_response();
        }
    };

    let composed = state
        .composer
        .compose(text, req.tts_enabled, &req.voice_name)
        .await;
    Json(composed).into_response()
}

/// `POST /tts` — synthesis only, raw MP3 bytes back.
pub async fn handle_tts(State(state): State<AppState>, Json(req): Json<TtsRequest>) -> Response {
    if req.text.is_empty() {
        return Json(json!({ "error": "No text provided" })).into_response();
    }

    match state.tts.synthesize(&req.text, &req.voice).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(e) => {
            error!("TTS endpoint synthesis failed: {:#}", e);
            Json(json!({ "error": AUDIO_FAILURE_MESSAGE })).into_response()
        }
    }
}

/// `POST /whatsapp` — runs the fixed fact-checker persona with TTS always
/// on, pushes the composed result to the configured downstream webhook, and
/// reports only that call's status code.
pub async fn handle_whatsapp(
    State(state): State<AppState>,
    Json(req): Json<WhatsappRequest>,
) -> Response {
    let cfg = &state.config.webhook;

    let text = match state
        .agent
        .generate_answer(
            &cfg.model_name,
            &cfg.model_provider,
            &cfg.system_prompt,
            std::slice::from_ref(&req.text),
            true,
        )
        .await
    {
        Ok(text) => text,
        Err(e) => {
            error!("Agent call failed for webhook request: {:#}", e);
            return Json(json!({ "error": "Failed to generate a response" })).into_response();
        }
    };

    let composed = state
        .composer
        .compose(text, true, &state.config.tts.default_voice)
        .await;

    match state
        .http
        .post(&cfg.url)
        .json(&composed)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
    {
        Ok(resp) => Json(DeliveryReceipt {
            status: resp.status().as_u16(),
        })
        .into_response(),
        Err(e) => {
            error!("Webhook forward to {} failed: {:#}", cfg.url, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to forward to webhook" })),
            )
                .into_response()
        }
    }
}

/// `GET /replay` — the most recent synthesized audio, if any.
pub async fn handle_replay(State(state): State<AppState>) -> Response {
    let Some(encoded) = state.replay.last() else {
        return Json(json!({ "error": "No audio to replay" })).into_response();
    };

    match general_purpose::STANDARD.decode(&encoded) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(e) => {
            error!("Stored replay audio is not valid base64: {}", e);
            Json(json!({ "error": "No audio to replay" })).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::handlers::router;
    use crate::handlers::types::ComposedResponse;
    use crate::state::AppState;
    use crate::traits::{AgentTrait, TtsTrait};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct MockAgent {
        answer: String,
        calls: AtomicUsize,
    }

    impl MockAgent {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AgentTrait for MockAgent {
        async fn generate_answer(
            &self,
            _model_name: &str,
            _model_provider: &str,
            _system_prompt: &str,
            _messages: &[String],
            _allow_search: bool,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct MockTts {
        bytes: Vec<u8>,
        calls: AtomicUsize,
    }

    impl MockTts {
        fn new(bytes: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                bytes,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TtsTrait for MockTts {
        async fn synthesize(&self, _text: &str, _voice: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    fn test_state(
        agent: Arc<MockAgent>,
        tts: Arc<MockTts>,
    ) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config: ServerConfig = serde_json::from_str("{}").unwrap();
        config.tts.cache_dir = dir.path().to_string_lossy().into_owned();
        let state = AppState::with_collaborators(config, agent, tts).unwrap();
        (state, dir)
    }

    async fn post_json(state: AppState, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn gate_rejection_short_circuits_all_downstream_calls() {
        let agent = MockAgent::new("should never be produced");
        let tts = MockTts::new(vec![1, 2, 3]);
        let (state, _dir) = test_state(agent.clone(), tts.clone());

        let (status, body) = post_json(
            state,
            "/chat",
            json!({
                "model_name": "not-a-real-model",
                "model_provider": "Groq",
                "messages": ["hello"],
                "tts_enabled": true
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "invalid model chosen. Choose a valid LLM");
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chat_end_to_end_with_tts() {
        let payload: Vec<u8> = (0..100).collect();
        let agent = MockAgent::new("No, the moon is not made of cheese.");
        let tts = MockTts::new(payload.clone());
        let (state, _dir) = test_state(agent, tts);
        let cache = state.cache.clone();

        let (status, body) = post_json(
            state,
            "/chat",
            json!({
                "model_name": "gpt-4o",
                "model_provider": "OpenAI",
                "system_prompt": "",
                "messages": ["Is the moon made of cheese?"],
                "allow_search": true,
                "tts_enabled": true,
                "voice_name": "en-SG-female-1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let resp: ComposedResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.text, "No, the moon is not made of cheese.");
        assert_eq!(resp.error, None);
        let decoded = general_purpose::STANDARD
            .decode(resp.audio.expect("audio present"))
            .unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn chat_without_tts_returns_null_audio() {
        let agent = MockAgent::new("just text");
        let tts = MockTts::new(vec![9, 9]);
        let (state, _dir) = test_state(agent, tts.clone());

        let (status, body) = post_json(
            state,
            "/chat",
            json!({
                "model_name": "llama-3.3-70b-versatile",
                "model_provider": "Groq",
                "messages": ["anything"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["text"], "just text");
        assert!(v["audio"].is_null());
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tts_endpoint_requires_text() {
        let agent = MockAgent::new("unused");
        let tts = MockTts::new(vec![1]);
        let (state, _dir) = test_state(agent, tts.clone());

        let (status, body) = post_json(state, "/tts", json!({ "voice": "en-SG-male-1" })).await;

        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "No text provided");
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tts_endpoint_returns_raw_mpeg_bytes() {
        let agent = MockAgent::new("unused");
        let tts = MockTts::new(b"raw-mp3".to_vec());
        let (state, _dir) = test_state(agent, tts);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({ "text": "read this" })).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "audio/mpeg"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"raw-mp3");
    }

    #[tokio::test]
    async fn replay_is_empty_until_first_synthesis() {
        let agent = MockAgent::new("answer");
        let tts = MockTts::new(b"voice".to_vec());
        let (state, _dir) = test_state(agent, tts);

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/replay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"], "No audio to replay");

        // After one synthesized chat the slot serves the bytes back.
        post_json(
            state.clone(),
            "/chat",
            json!({
                "model_name": "gpt-4o",
                "model_provider": "OpenAI",
                "messages": ["q"],
                "tts_enabled": true
            }),
        )
        .await;

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/replay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"voice");
    }
}
