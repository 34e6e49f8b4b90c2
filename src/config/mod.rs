use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub tts: TtsSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelSettings {
    /// Models the gate accepts. Requests naming anything else are rejected
    /// before any agent call is made.
    #[serde(default = "default_allowed_models")]
    pub allowed: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    /// Endpoint of the external reasoning agent service.
    #[serde(default = "default_agent_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsSettings {
    #[serde(default = "default_tts_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice")]
    pub default_voice: String,
    /// Scratch directory for generated audio artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Maximum number of artifacts kept on disk at once (FIFO eviction).
    #[serde(default = "default_retention")]
    pub retention: usize,
}

#[derive(Debug, Deserialize)]
pub struct WebhookSettings {
    /// Downstream URL the /whatsapp endpoint forwards composed replies to.
    #[serde(default = "default_webhook_url")]
    pub url: String,
    #[serde(default = "default_webhook_model")]
    pub model_name: String,
    #[serde(default = "default_webhook_provider")]
    pub model_provider: String,
    #[serde(default = "default_fact_check_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub token: String,
    /// Where the bot sends /verify requests. Fixed at startup.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_webhook_model")]
    pub model_name: String,
    #[serde(default = "default_webhook_provider")]
    pub model_provider: String,
    #[serde(default = "default_fact_check_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_voice")]
    pub voice_name: String,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_allowed_models() -> Vec<String> {
    [
        "llama-3.3-70b-versatile",
        "gpt-4o",
        "deepseek-r1-distill-qwen-32b",
        "gemma2-9b-it",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_agent_url() -> String {
    "http://127.0.0.1:9000/generate".to_string()
}

fn default_tts_url() -> String {
    "https://api.jigsawstack.com/v1/ai/tts".to_string()
}

fn default_voice() -> String {
    "en-SG-female-1".to_string()
}

fn default_cache_dir() -> String {
    "audio_cache".to_string()
}

fn default_retention() -> usize {
    5
}

fn default_webhook_url() -> String {
    "http://localhost:3001/reply".to_string()
}

fn default_webhook_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_webhook_provider() -> String {
    "Groq".to_string()
}

fn default_fact_check_prompt() -> String {
    "Act as a fact checker who will determine if the query is real or fake. \
     Only use reputable sources and provide them in your reply. \
     Reply back in singlish"
        .to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3000/chat".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            allowed: default_allowed_models(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            api_key: String::new(),
        }
    }
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            api_key: String::new(),
            default_voice: default_voice(),
            cache_dir: default_cache_dir(),
            retention: default_retention(),
        }
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            model_name: default_webhook_model(),
            model_provider: default_webhook_provider(),
            system_prompt: default_fact_check_prompt(),
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            enable: false,
            token: String::new(),
            backend_url: default_backend_url(),
            model_name: default_webhook_model(),
            model_provider: default_webhook_provider(),
            system_prompt: default_fact_check_prompt(),
            voice_name: default_voice(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("Settings.toml").required(false))
            .add_source(config::Environment::with_prefix("FACTBOT").separator("__"));

        builder.build()?.try_deserialize()
    }
}
