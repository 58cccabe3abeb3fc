//! Model fallback on rate limiting
//!
//! Information Hiding:
//! - Sits between the executor and a concrete transport
//! - Tracks a sliding one-minute request window per provider
//! - Switches provider/model when the current one is rate limited
//!
//! Any other failure is returned unchanged; only quota exhaustion triggers
//! a switch.

use crate::core::transport::{ModelHint, TransportError, TransportPort};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Requests-per-minute bookkeeping per provider
#[derive(Debug, Default)]
pub struct ProviderQuota {
    limits: HashMap<String, usize>,
    timestamps: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl ProviderQuota {
    /// Providers without a configured limit are never throttled
    pub fn new(limits: HashMap<String, usize>) -> Self {
        Self {
            limits,
            timestamps: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve a slot for `provider` if its window has room
    pub async fn try_acquire(&self, provider: &str) -> bool {
        let Some(&limit) = self.limits.get(provider) else {
            return true;
        };

        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().await;
        let window = timestamps.entry(provider.to_string()).or_default();
        while window
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= WINDOW)
        {
            window.pop_front();
        }

        if window.len() >= limit {
            return false;
        }
        window.push_back(now);
        true
    }

    /// Requests still allowed for `provider` in the current window
    pub async fn remaining(&self, provider: &str) -> Option<usize> {
        let limit = *self.limits.get(provider)?;
        let now = Instant::now();
        let timestamps = self.timestamps.lock().await;
        let used = timestamps
            .get(provider)
            .map(|w| w.iter().filter(|ts| now.duration_since(**ts) < WINDOW).count())
            .unwrap_or(0);
        Some(limit.saturating_sub(used))
    }
}

/// Transport decorator that walks a fallback chain on rate limits
pub struct FallbackTransport {
    inner: Arc<dyn TransportPort>,
    fallbacks: Vec<ModelHint>,
    quota: ProviderQuota,
}

impl FallbackTransport {
    pub fn new(inner: Arc<dyn TransportPort>, fallbacks: Vec<ModelHint>) -> Self {
        Self {
            inner,
            fallbacks,
            quota: ProviderQuota::default(),
        }
    }

    pub fn with_quota(mut self, quota: ProviderQuota) -> Self {
        self.quota = quota;
        self
    }

    fn candidates(&self, hint: &ModelHint) -> Vec<ModelHint> {
        let mut chain = vec![hint.clone()];
        for fallback in &self.fallbacks {
            if !chain.contains(fallback) {
                chain.push(fallback.clone());
            }
        }
        chain
    }
}

#[async_trait]
impl TransportPort for FallbackTransport {
    async fn call(&self, prompt: &str, hint: &ModelHint) -> Result<String, TransportError> {
        let mut last_error = None;

        for candidate in self.candidates(hint) {
            if !self.quota.try_acquire(&candidate.provider).await {
                tracing::debug!(
                    "[FallbackTransport] Request window for '{}' exhausted, skipping {}",
                    candidate.provider,
                    candidate
                );
                last_error = Some(TransportError::RateLimited {
                    message: format!("local request quota for {} exhausted", candidate.provider),
                    retry_after_ms: None,
                });
                continue;
            }

            match self.inner.call(prompt, &candidate).await {
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(
                        "[FallbackTransport] {} rate limited, trying next model",
                        candidate
                    );
                    last_error = Some(e);
                }
                other => return other,
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Unknown("No model candidates available".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::ScriptedTransport;

    #[tokio::test(start_paused = true)]
    async fn test_quota_window_slides() {
        let quota = ProviderQuota::new(HashMap::from([("gemini".to_string(), 2)]));

        assert!(quota.try_acquire("gemini").await);
        assert!(quota.try_acquire("gemini").await);
        assert!(!quota.try_acquire("gemini").await);
        assert_eq!(quota.remaining("gemini").await, Some(0));
        assert!(quota.try_acquire("groq").await);
        assert_eq!(quota.remaining("groq").await, None);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(quota.remaining("gemini").await, Some(2));
        assert!(quota.try_acquire("gemini").await);
    }

    #[tokio::test]
    async fn test_falls_back_on_rate_limit() {
        let inner = Arc::new(ScriptedTransport::new(|_prompt, hint| {
            if hint.provider == "gemini" {
                Err(TransportError::RateLimited {
                    message: "429".to_string(),
                    retry_after_ms: None,
                })
            } else {
                Ok(format!("answer from {}", hint))
            }
        }));
        let transport = FallbackTransport::new(
            inner.clone(),
            vec![ModelHint::new("groq", "llama"), ModelHint::new("mistral", "small")],
        );

        let reply = transport
            .call("hello", &ModelHint::new("gemini", "flash"))
            .await
            .unwrap();

        assert_eq!(reply, "answer from groq/llama");
        let hints: Vec<_> = inner.calls().into_iter().map(|c| c.hint.provider).collect();
        assert_eq!(hints, vec!["gemini", "groq"]);
    }

    #[tokio::test]
    async fn test_other_errors_do_not_fall_back() {
        let inner = Arc::new(ScriptedTransport::new(|_, _| {
            Err(TransportError::Auth("bad key".to_string()))
        }));
        let transport =
            FallbackTransport::new(inner.clone(), vec![ModelHint::new("groq", "llama")]);

        let err = transport
            .call("hello", &ModelHint::new("gemini", "flash"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Auth(_)));
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_provider() {
        let inner = Arc::new(ScriptedTransport::new(|_, hint| Ok(hint.provider.clone())));
        let transport = FallbackTransport::new(inner.clone(), vec![ModelHint::new("groq", "llama")])
            .with_quota(ProviderQuota::new(HashMap::from([("gemini".to_string(), 0)])));

        let reply = transport
            .call("hello", &ModelHint::new("gemini", "flash"))
            .await
            .unwrap();

        assert_eq!(reply, "groq");
        assert_eq!(inner.call_count(), 1);
    }
}
