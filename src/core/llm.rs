//! OpenAI-compatible chat-completions transport
//!
//! One endpoint per provider name; the model comes from the call's hint.
//! Network and 5xx failures are retried here with exponential backoff,
//! rate limits and authentication failures are handed back to the caller.

use crate::config::{LLMConfig, ProviderConfig};
use crate::core::transport::{ModelHint, TransportError, TransportPort};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Resolved endpoint for one provider
#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
}

pub struct HttpTransport {
    client: Client,
    endpoints: HashMap<String, Endpoint>,
    llm: LLMConfig,
}

impl HttpTransport {
    /// Build from provider settings, reading API keys from the environment
    pub fn new(providers: &HashMap<String, ProviderConfig>, llm: LLMConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.request_timeout_secs))
            .build()?;

        let endpoints = providers
            .iter()
            .map(|(name, cfg)| {
                let api_key = std::env::var(&cfg.api_key_env).ok();
                if api_key.is_none() {
                    tracing::debug!(
                        "[HttpTransport] {} not set, provider '{}' will fail authentication",
                        cfg.api_key_env,
                        name
                    );
                }
                (
                    name.clone(),
                    Endpoint {
                        base_url: cfg.base_url.trim_end_matches('/').to_string(),
                        api_key,
                        api_key_env: cfg.api_key_env.clone(),
                    },
                )
            })
            .collect();

        Ok(Self {
            client,
            endpoints,
            llm,
        })
    }

    /// Register or replace a provider endpoint with an explicit key
    pub fn with_endpoint(
        mut self,
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        self.endpoints.insert(
            provider.into(),
            Endpoint {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: Some(api_key.into()),
                api_key_env: String::new(),
            },
        );
        self
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_header = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| (secs * 1000.0).ceil() as u64);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &body, retry_header));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| TransportError::Unknown(format!("Response decode error: {}", e)))?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl TransportPort for HttpTransport {
    async fn call(&self, prompt: &str, hint: &ModelHint) -> Result<String, TransportError> {
        let endpoint = self.endpoints.get(&hint.provider).ok_or_else(|| {
            TransportError::Unknown(format!("Unknown provider: {}", hint.provider))
        })?;
        let api_key = endpoint.api_key.as_deref().ok_or_else(|| {
            TransportError::Auth(format!(
                "{} environment variable not set",
                endpoint.api_key_env
            ))
        })?;

        let request = ChatRequest {
            model: &hint.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            stream: false,
        };

        let attempts = self.llm.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = retry_delay_ms(attempt);
                tracing::warn!(
                    "[HttpTransport] Retrying {} (attempt {}/{}) after {}ms delay",
                    hint,
                    attempt + 1,
                    attempts,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.send_once(endpoint, api_key, &request).await {
                Ok(text) => return Ok(text),
                Err(e @ TransportError::Network(_)) => {
                    tracing::warn!("[HttpTransport] {} failed: {}", hint, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| TransportError::Unknown("All retry attempts failed".to_string())))
    }
}

/// Exponential backoff before retry `attempt` (1-based), capped
fn retry_delay_ms(attempt: u32) -> u64 {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS)
}

fn retry_hint_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)retry (?:in|after) ([\d.]+)\s*s").ok())
        .as_ref()
}

/// Provider-suggested wait in milliseconds parsed from an error body
pub fn parse_retry_hint(text: &str) -> Option<u64> {
    retry_hint_pattern()?
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).ceil() as u64)
}

/// Map an unsuccessful HTTP status onto the transport error classes
pub fn classify_status(status: StatusCode, body: &str, retry_after_ms: Option<u64>) -> TransportError {
    let message = format!("API error {}: {}", status, body);
    let quota_text = body.contains("RESOURCE_EXHAUSTED") || body.to_lowercase().contains("quota");

    if status == StatusCode::TOO_MANY_REQUESTS || quota_text {
        TransportError::RateLimited {
            message,
            retry_after_ms: retry_after_ms.or_else(|| parse_retry_hint(body)),
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TransportError::Auth(message)
    } else if status.is_server_error() {
        TransportError::Network(message)
    } else {
        TransportError::Unknown(message)
    }
}
