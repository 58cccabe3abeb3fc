//! Transport port - the only way the engine reaches an LLM
//!
//! Information Hiding:
//! - HTTP, authentication and provider quirks live behind `TransportPort`
//! - The engine only distinguishes rate limiting from every other failure
//! - Model choice per agent is delegated to a `ModelSelector`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Provider/model hint attached to every call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHint {
    pub provider: String,
    pub model: String,
}

impl ModelHint {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ModelHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Transport failure classes
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Unknown(String),
}

impl TransportError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited { .. })
    }
}

/// "Given a prompt and a model/provider hint, return text or fail."
#[async_trait]
pub trait TransportPort: Send + Sync {
    async fn call(&self, prompt: &str, hint: &ModelHint) -> Result<String, TransportError>;
}

/// Supplies the provider/model hint for each agent call
pub trait ModelSelector: Send + Sync {
    fn select_for(&self, agent_id: &str) -> ModelHint;
}

/// Selector backed by a default hint plus per-agent overrides
#[derive(Debug, Clone)]
pub struct StaticModelSelector {
    default: ModelHint,
    overrides: HashMap<String, ModelHint>,
}

impl StaticModelSelector {
    pub fn new(default: ModelHint) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, agent_id: impl Into<String>, hint: ModelHint) -> Self {
        self.overrides.insert(agent_id.into(), hint);
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, ModelHint>) -> Self {
        self.overrides.extend(overrides);
        self
    }
}

impl ModelSelector for StaticModelSelector {
    fn select_for(&self, agent_id: &str) -> ModelHint {
        self.overrides
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_selector_override() {
        let selector = StaticModelSelector::new(ModelHint::new("openai", "gpt-4o-mini"))
            .with_override("debugger", ModelHint::new("groq", "llama-3.3-70b"));

        assert_eq!(selector.select_for("debugger").provider, "groq");
        assert_eq!(selector.select_for("frontend").model, "gpt-4o-mini");
    }

    #[test]
    fn test_model_hint_display() {
        assert_eq!(ModelHint::new("gemini", "flash").to_string(), "gemini/flash");
    }
}
