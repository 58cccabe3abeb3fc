//! In-process transports for offline runs and tests
//!
//! `ScriptedTransport` answers through a closure and records every call,
//! `EchoTransport` answers with a short canned reply.

use crate::core::transport::{ModelHint, TransportError, TransportPort};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type Responder = dyn Fn(&str, &ModelHint) -> Result<String, TransportError> + Send + Sync;

/// One recorded transport call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub hint: ModelHint,
}

pub struct ScriptedTransport {
    responder: Box<Responder>,
    latency: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &ModelHint) -> Result<String, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering each call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.log().clone()
    }

    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    fn log(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TransportPort for ScriptedTransport {
    async fn call(&self, prompt: &str, hint: &ModelHint) -> Result<String, TransportError> {
        self.log().push(RecordedCall {
            prompt: prompt.to_string(),
            hint: hint.clone(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        (self.responder)(prompt, hint)
    }
}

/// Replies with the last line of the prompt's user message
#[derive(Debug, Default)]
pub struct EchoTransport;

#[async_trait]
impl TransportPort for EchoTransport {
    async fn call(&self, prompt: &str, hint: &ModelHint) -> Result<String, TransportError> {
        let last_user = prompt
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix("User: "))
            .unwrap_or("(no input)");

        Ok(format!("[offline {}] Echo: {}", hint, last_user))
    }
}
