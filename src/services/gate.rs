/// Body text returned whenever the gate rejects a model.
pub const INVALID_MODEL_MESSAGE: &str = "invalid model chosen. Choose a valid LLM";

/// Gate rejection marker. The caller surfaces [`INVALID_MODEL_MESSAGE`] and
/// performs no downstream work.
#[derive(Debug, PartialEq, Eq)]
pub struct Rejected;

/// Allow-list check performed before any agent or synthesizer call.
/// Static configuration, no side effects.
pub struct ModelGate {
    allowed: Vec<String>,
}

impl ModelGate {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn validate(&self, model_name: &str) -> Result<(), Rejected> {
        if self.allowed.iter().any(|m| m == model_name) {
            Ok(())
        } else {
            Err(Rejected)
        }
    }
}
