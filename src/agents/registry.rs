//! Agent Registry - definitions and per-agent runtime state
//!
//! Information Hiding:
//! - Registration order and lookup index hidden behind one lock
//! - Mutations (activate, deactivate, append, clear) are serialized
//! - Callers receive cloned snapshots, never references into the lock
//!
//! Definitions are immutable once registered. Runtime state (active flag and
//! conversation history) lives next to them and is only touched through the
//! registry's methods.

use crate::error::{EnsembleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Immutable description of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub specialization_prompt: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Mutable state kept for every registered agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRuntimeState {
    pub active: bool,
    pub history: Vec<ConversationTurn>,
}

/// Definition plus a copy of its trailing history, used to build one prompt
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub definition: Arc<AgentDefinition>,
    pub active: bool,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

/// Serializable view of the registry without specialization prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryExport {
    pub agents: Vec<ExportedAgent>,
    pub active_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAgent {
    pub id: String,
    pub name: String,
    pub role: String,
    pub capabilities: Vec<String>,
}

struct AgentEntry {
    definition: Arc<AgentDefinition>,
    state: AgentRuntimeState,
}

#[derive(Default)]
struct RegistryState {
    order: Vec<String>,
    agents: HashMap<String, AgentEntry>,
}

impl RegistryState {
    fn entry_mut(&mut self, id: &str) -> Result<&mut AgentEntry> {
        self.agents
            .get_mut(id)
            .ok_or_else(|| EnsembleError::AgentNotFound(id.to_string()))
    }

    fn ordered(&self) -> impl Iterator<Item = &AgentEntry> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }
}

pub struct AgentRegistry {
    state: RwLock<RegistryState>,
    max_retained: usize,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Registry that retains the full history of every agent
    pub fn new() -> Self {
        Self::with_retention(0)
    }

    /// Keep at most `max_retained` turns per agent (0 = unbounded)
    pub fn with_retention(max_retained: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            max_retained,
        }
    }

    /// Insert an inactive agent with empty history
    pub async fn register(&self, definition: AgentDefinition) -> Result<()> {
        let mut state = self.state.write().await;
        if state.agents.contains_key(&definition.id) {
            tracing::warn!("[AgentRegistry] Rejecting duplicate agent '{}'", definition.id);
            return Err(EnsembleError::DuplicateAgent(definition.id));
        }

        tracing::debug!("[AgentRegistry] Registered agent '{}'", definition.id);
        state.order.push(definition.id.clone());
        state.agents.insert(
            definition.id.clone(),
            AgentEntry {
                definition: Arc::new(definition),
                state: AgentRuntimeState::default(),
            },
        );
        Ok(())
    }

    /// Mark an agent active; already active is a no-op success
    pub async fn activate(&self, id: &str) -> Result<()> {
        self.set_active(id, true).await
    }

    /// Mark an agent inactive; already inactive is a no-op success
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.entry_mut(id)?;
        if entry.state.active == active {
            tracing::debug!(
                "[AgentRegistry] Agent '{}' already {}",
                id,
                if active { "active" } else { "inactive" }
            );
            return Ok(());
        }
        entry.state.active = active;
        tracing::info!(
            "[AgentRegistry] Agent '{}' {}",
            id,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }

    /// Flip the active flag, returning the new value
    pub async fn toggle(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let entry = state.entry_mut(id)?;
        entry.state.active = !entry.state.active;
        Ok(entry.state.active)
    }

    /// Activate several agents, reporting each outcome separately
    pub async fn activate_many<S: AsRef<str>>(&self, ids: &[S]) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            results.push((id.to_string(), self.activate(id).await));
        }
        let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
        tracing::info!("[AgentRegistry] Activated {}/{} agents", ok, ids.len());
        results
    }

    /// Deactivate everything, returning the ids that were active
    pub async fn deactivate_all(&self) -> Vec<String> {
        let mut state = self.state.write().await;
        let RegistryState { order, agents } = &mut *state;
        let mut deactivated = Vec::new();
        for id in order.iter() {
            if let Some(entry) = agents.get_mut(id) {
                if entry.state.active {
                    entry.state.active = false;
                    deactivated.push(id.clone());
                }
            }
        }
        deactivated
    }

    pub async fn is_active(&self, id: &str) -> bool {
        let state = self.state.read().await;
        state.agents.get(id).is_some_and(|e| e.state.active)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.agents.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<AgentDefinition>> {
        let state = self.state.read().await;
        state.agents.get(id).map(|e| Arc::clone(&e.definition))
    }

    /// All definitions in registration order
    pub async fn list_agents(&self) -> Vec<Arc<AgentDefinition>> {
        let state = self.state.read().await;
        state.ordered().map(|e| Arc::clone(&e.definition)).collect()
    }

    /// Active definitions in registration order
    pub async fn list_active(&self) -> Vec<Arc<AgentDefinition>> {
        let state = self.state.read().await;
        state
            .ordered()
            .filter(|e| e.state.active)
            .map(|e| Arc::clone(&e.definition))
            .collect()
    }

    /// Definition plus the last `window` turns of its history
    pub async fn snapshot(&self, id: &str, window: usize) -> Result<AgentSnapshot> {
        let state = self.state.read().await;
        let entry = state
            .agents
            .get(id)
            .ok_or_else(|| EnsembleError::AgentNotFound(id.to_string()))?;
        let history = &entry.state.history;
        let start = history.len().saturating_sub(window);
        Ok(AgentSnapshot {
            definition: Arc::clone(&entry.definition),
            active: entry.state.active,
            history: history[start..].to_vec(),
        })
    }

    /// Full retained history of one agent
    pub async fn history(&self, id: &str) -> Result<Vec<ConversationTurn>> {
        let state = self.state.read().await;
        state
            .agents
            .get(id)
            .map(|e| e.state.history.clone())
            .ok_or_else(|| EnsembleError::AgentNotFound(id.to_string()))
    }

    pub async fn append_turn(&self, id: &str, turn: ConversationTurn) -> Result<()> {
        self.append_turns(id, [turn]).await
    }

    /// Append several turns under a single lock acquisition
    pub async fn append_turns(
        &self,
        id: &str,
        turns: impl IntoIterator<Item = ConversationTurn>,
    ) -> Result<()> {
        let max_retained = self.max_retained;
        let mut state = self.state.write().await;
        let history = &mut state.entry_mut(id)?.state.history;
        history.extend(turns);
        if max_retained > 0 && history.len() > max_retained {
            let excess = history.len() - max_retained;
            history.drain(..excess);
        }
        Ok(())
    }

    pub async fn clear_history(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.entry_mut(id)?.state.history.clear();
        tracing::debug!("[AgentRegistry] Cleared history of '{}'", id);
        Ok(())
    }

    pub async fn clear_all_history(&self) {
        let mut state = self.state.write().await;
        for entry in state.agents.values_mut() {
            entry.state.history.clear();
        }
        tracing::debug!("[AgentRegistry] Cleared history of all agents");
    }

    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        let total = state.agents.len();
        let active = state.agents.values().filter(|e| e.state.active).count();
        RegistryStats {
            total,
            active,
            inactive: total - active,
        }
    }

    pub async fn export_config(&self) -> RegistryExport {
        let state = self.state.read().await;
        RegistryExport {
            agents: state
                .ordered()
                .map(|e| ExportedAgent {
                    id: e.definition.id.clone(),
                    name: e.definition.name.clone(),
                    role: e.definition.role.clone(),
                    capabilities: e.definition.capabilities.clone(),
                })
                .collect(),
            active_agents: state
                .ordered()
                .filter(|e| e.state.active)
                .map(|e| e.definition.id.clone())
                .collect(),
        }
    }

    #[cfg(test)]
    async fn runtime_state(&self, id: &str) -> Option<AgentRuntimeState> {
        let state = self.state.read().await;
        state.agents.get(id).map(|e| e.state.clone())
    }
}
