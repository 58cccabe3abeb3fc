use crate::core::transport::ModelHint;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LLMConfig,
    pub executor: ExecutorConfig,
    pub history: HistoryConfig,
    pub session: SessionConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

/// Pacing between sequential calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub inter_call_delay_ms: u64,
    pub failure_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            inter_call_delay_ms: 2000,
            failure_backoff_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Trailing turns rendered into each prompt
    pub prompt_window: usize,
    /// Turns kept per agent for display, 0 keeps everything
    pub max_retained: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            prompt_window: 5,
            max_retained: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub orchestrator_id: String,
    pub min_participants: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            orchestrator_id: "orchestrator".to_string(),
            min_participants: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub default_provider: String,
    pub default_model: String,
    #[serde(default)]
    pub overrides: HashMap<String, ModelHint>,
    #[serde(default)]
    pub fallbacks: Vec<ModelHint>,
    #[serde(default)]
    pub requests_per_minute: HashMap<String, usize>,
}

impl ModelsConfig {
    pub fn default_hint(&self) -> ModelHint {
        ModelHint::new(&self.default_provider, &self.default_model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("ENSEMBLE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Built-in values only, no file or environment
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder())?
            .build()?
            .try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("llm.max_tokens", 2000)?
            .set_default("llm.temperature", 0.7)?
            .set_default("llm.max_retries", 3)?
            .set_default("llm.request_timeout_secs", 120)?
            .set_default("executor.inter_call_delay_ms", 2000)?
            .set_default("executor.failure_backoff_ms", 5000)?
            .set_default("history.prompt_window", 5)?
            .set_default("history.max_retained", 50)?
            .set_default("session.orchestrator_id", "orchestrator")?
            .set_default("session.min_participants", 2)?
            .set_default("models.default_provider", "openai")?
            .set_default("models.default_model", "gpt-4o-mini")?
            .set_default("providers.openai.base_url", "https://api.openai.com/v1")?
            .set_default("providers.openai.api_key_env", "OPENAI_API_KEY")?
            .set_default("logging.level", "info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_design_values() {
        let settings = Settings::defaults().unwrap();
        assert_eq!(settings.executor.inter_call_delay_ms, 2000);
        assert_eq!(settings.executor.failure_backoff_ms, 5000);
        assert_eq!(settings.history.prompt_window, 5);
        assert_eq!(settings.session.orchestrator_id, "orchestrator");
        assert_eq!(settings.models.default_hint().provider, "openai");
        assert!(settings.providers.contains_key("openai"));
    }
}
