use async_trait::async_trait;

/// The external reasoning agent. Given a model selection and a conversation,
/// it produces a plain-text answer. Everything about how the answer is made
/// (search tools, prompting) lives on the other side of this seam.
#[async_trait]
pub trait AgentTrait: Send + Sync {
    async fn generate_answer(
        &self,
        model_name: &str,
        model_provider: &str,
        system_prompt: &str,
        messages: &[String],
        allow_search: bool,
    ) -> anyhow::Result<String>;
}

/// The external text-to-speech service. Synthesis is atomic: all MP3 bytes
/// or a tagged error, so callers can degrade to a text-only reply.
#[async_trait]
pub trait TtsTrait: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Vec<u8>>;
}
