use std::sync::{Arc, RwLock};

use crate::config::ServerConfig;
use crate::services::{
    agent::remote::RemoteAgent, audio_cache::AudioCache, composer::ResponseComposer,
    gate::ModelGate, tts::jigsaw::JigsawTts,
};
use crate::traits::{AgentTrait, TtsTrait};

/// Size-1 replay buffer for the most recent base64 audio. Last-writer-wins
/// overwrite; strictly separate from the artifact cache.
#[derive(Clone, Default)]
pub struct ReplaySlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl ReplaySlot {
    pub fn store(&self, audio_b64: String) {
        *self.inner.write().unwrap() = Some(audio_b64);
    }

    pub fn last(&self) -> Option<String> {
        self.inner.read().unwrap().clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub agent: Arc<dyn AgentTrait + Send + Sync>,
    pub tts: Arc<dyn TtsTrait + Send + Sync>,
    pub cache: Arc<AudioCache>,
    pub composer: Arc<ResponseComposer>,
    pub gate: Arc<ModelGate>,
    pub replay: ReplaySlot,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let agent = Arc::new(RemoteAgent::new(
            config.agent.url.clone(),
            config.agent.api_key.clone(),
        ));
        let tts = Arc::new(JigsawTts::new(
            config.tts.url.clone(),
            config.tts.api_key.clone(),
        ));
        Self::with_collaborators(config, agent, tts)
    }

    /// Wires the state around injected collaborators. Tests swap in mocks
    /// here; `new` passes the real remote adapters.
    pub fn with_collaborators(
        config: ServerConfig,
        agent: Arc<dyn AgentTrait + Send + Sync>,
        tts: Arc<dyn TtsTrait + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let cache = Arc::new(AudioCache::new(
            config.tts.cache_dir.clone(),
            config.tts.retention,
        )?);
        let replay = ReplaySlot::default();
        let composer = Arc::new(ResponseComposer::new(
            tts.clone(),
            cache.clone(),
            replay.clone(),
        ));
        let gate = Arc::new(ModelGate::new(config.models.allowed.clone()));

        Ok(Self {
            config: Arc::new(config),
            agent,
            tts,
            cache,
            composer,
            gate,
            replay,
            http: reqwest::Client::new(),
        })
    }
}
