//! Error taxonomy for the orchestration engine
//!
//! Structural errors (`AgentNotFound`, `InsufficientParticipants`,
//! `OrchestratorInactive`) abort a session before any transport call is made.
//! Per-call failures never abort a batch; they travel inside a failed
//! `CallOutcome` as a `CallError`.

use crate::core::transport::TransportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to callers of the engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnsembleError {
    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    #[error("Agent '{0}' is already registered")]
    DuplicateAgent(String),

    #[error("Session needs at least {required} participants, got {actual}")]
    InsufficientParticipants { required: usize, actual: usize },

    #[error("Orchestrator agent '{0}' is not active")]
    OrchestratorInactive(String),

    #[error("Call to agent '{agent_id}' failed: {source}")]
    Call {
        agent_id: String,
        #[source]
        source: CallError,
    },

    #[error("Session cancelled")]
    SessionCancelled,
}

/// Failure of a single agent call, recorded in the phase trail
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallError {
    #[error("transport error: {error}")]
    Transport { error: TransportError },

    #[error("call cancelled")]
    Cancelled,

    #[error("agent '{agent_id}' not found")]
    AgentNotFound { agent_id: String },
}

impl From<TransportError> for CallError {
    fn from(error: TransportError) -> Self {
        CallError::Transport { error }
    }
}

impl CallError {
    /// Rate-limit failures get the extended backoff before the next call
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CallError::Transport { error } if error.is_rate_limited())
    }

    /// Suggested wait reported by the provider, if any
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            CallError::Transport {
                error: TransportError::RateLimited { retry_after_ms, .. },
            } => *retry_after_ms,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EnsembleError>;
