//! Plan Parser - task distribution plans from orchestrator output
//!
//! Information Hiding:
//! - Locates the first balanced JSON object in free text
//! - Tolerates loose field types (priority as number or string)
//! - Always yields a usable plan: decoding failures fall back to
//!   assigning the original task to every active agent
//!
//! Wire format requested from the orchestrator:
//! `{"analysis": "...", "agents": [{"agent": "id", "task": "...", "priority": 1}], "expectedOutcome": "..."}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent_id: String,
    pub task: String,
    pub priority: i64,
}

/// Where a plan came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSource {
    Parsed,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub analysis: String,
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,
    pub source: PlanSource,
}

impl SessionPlan {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PlanSource::Fallback { .. })
    }

    /// Assignments by ascending priority (stable), never targeting `orchestrator_id`
    pub fn execution_order(&self, orchestrator_id: &str) -> Vec<&Assignment> {
        let mut ordered: Vec<&Assignment> = self
            .assignments
            .iter()
            .filter(|a| a.agent_id != orchestrator_id)
            .collect();
        ordered.sort_by_key(|a| a.priority);
        ordered
    }
}

/// Plan as the orchestrator writes it
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    analysis: String,
    agents: Vec<RawAssignment>,
    #[serde(default, rename = "expectedOutcome", alias = "expected_outcome")]
    expected_outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    #[serde(alias = "agent_id", alias = "agentId")]
    agent: String,
    #[serde(default)]
    task: String,
    #[serde(default, deserialize_with = "deserialize_priority")]
    priority: Option<i64>,
}

/// Accepts `1`, `1.0` or `"1"`
fn deserialize_priority<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Byte range of the first balanced `{...}` object, string-literal aware
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

pub struct PlanParser {
    orchestrator_id: String,
    known_agents: HashSet<String>,
}

impl PlanParser {
    pub fn new<I, S>(orchestrator_id: impl Into<String>, known_agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            orchestrator_id: orchestrator_id.into(),
            known_agents: known_agents.into_iter().map(Into::into).collect(),
        }
    }

    /// Turn orchestrator output into a plan, falling back when it is not decodable
    pub fn parse(&self, response: &str, active_agents: &[String], original_task: &str) -> SessionPlan {
        match self.decode(response) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::warn!(
                    "[PlanParser] Could not use orchestrator response as a plan ({}), assigning task to {} active agents",
                    reason,
                    active_agents.len()
                );
                self.fallback(response, active_agents, original_task, reason)
            }
        }
    }

    fn decode(&self, response: &str) -> Result<SessionPlan, String> {
        let json = find_json_object(response).ok_or_else(|| "no JSON object found".to_string())?;
        let raw: RawPlan =
            serde_json::from_str(json).map_err(|e| format!("invalid plan JSON: {}", e))?;

        let assignments = raw
            .agents
            .into_iter()
            .enumerate()
            .filter_map(|(index, a)| {
                if a.agent == self.orchestrator_id {
                    tracing::debug!("[PlanParser] Dropping assignment to the orchestrator itself");
                    return None;
                }
                if !self.known_agents.contains(&a.agent) {
                    tracing::warn!("[PlanParser] Dropping assignment to unknown agent '{}'", a.agent);
                    return None;
                }
                Some(Assignment {
                    agent_id: a.agent,
                    task: a.task,
                    priority: a.priority.unwrap_or(index as i64 + 1),
                })
            })
            .collect();

        Ok(SessionPlan {
            analysis: raw.analysis,
            assignments,
            expected_outcome: raw.expected_outcome,
            source: PlanSource::Parsed,
        })
    }

    fn fallback(
        &self,
        response: &str,
        active_agents: &[String],
        original_task: &str,
        reason: String,
    ) -> SessionPlan {
        let assignments = active_agents
            .iter()
            .filter(|id| **id != self.orchestrator_id)
            .enumerate()
            .map(|(index, id)| Assignment {
                agent_id: id.clone(),
                task: original_task.to_string(),
                priority: index as i64 + 1,
            })
            .collect();

        SessionPlan {
            analysis: response.to_string(),
            assignments,
            expected_outcome: None,
            source: PlanSource::Fallback { reason },
        }
    }
}
