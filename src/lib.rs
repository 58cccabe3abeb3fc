//! Ensemble - orchestration of role-bound LLM agents
//!
//! A fixed pool of specialized agents works on one task, either
//! collaboratively (analysis, review, synthesis) or driven by an
//! orchestrator's plan. Calls are paced to respect provider rate limits
//! and individual failures never abort a session.

pub mod agents;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

pub use api::Ensemble;
pub use crate::config::Settings;
pub use error::{CallError, EnsembleError, Result};

pub use agents::{
    AgentBuilder, AgentDefinition, AgentRegistry, CallOutcome, ConversationTurn, PhaseKind,
    PhaseResult, PlanParser, PromptBuilder, Protocol, SequencedExecutor, SessionCoordinator,
    SessionPlan, SessionReport, SessionStatus, TaskContext,
};
pub use crate::core::transport::{
    ModelHint, ModelSelector, StaticModelSelector, TransportError, TransportPort,
};
