//! Agent orchestration
//!
//! Leaf-first: registry and prompt building, the executor that drives
//! transport calls, the plan parser, and the coordinator that composes
//! them into session protocols.

pub mod builder;
pub mod coordinator;
pub mod defaults;
pub mod executor;
pub mod messages;
pub mod plan;
pub mod prompt;
pub mod registry;

pub use builder::AgentBuilder;
pub use coordinator::SessionCoordinator;
pub use executor::{AgentCall, SequencedExecutor};
pub use messages::{
    CallOutcome, PhaseKind, PhaseResult, Protocol, SessionReport, SessionStatus,
};
pub use plan::{Assignment, PlanParser, PlanSource, SessionPlan};
pub use prompt::{PromptBuilder, TaskContext};
pub use registry::{
    AgentDefinition, AgentRegistry, AgentRuntimeState, AgentSnapshot, ConversationTurn,
    RegistryExport, RegistryStats, TurnRole,
};
