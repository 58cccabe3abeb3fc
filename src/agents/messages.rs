use crate::agents::plan::SessionPlan;
use crate::error::{CallError, EnsembleError, Result};
use serde::{Deserialize, Serialize};

/// Result of one agent call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Success {
        agent_id: String,
        agent_name: String,
        response: String,
    },
    Failure {
        agent_id: String,
        agent_name: String,
        error: CallError,
    },
}

impl CallOutcome {
    pub fn agent_id(&self) -> &str {
        match self {
            CallOutcome::Success { agent_id, .. } | CallOutcome::Failure { agent_id, .. } => {
                agent_id
            }
        }
    }

    pub fn agent_name(&self) -> &str {
        match self {
            CallOutcome::Success { agent_name, .. } | CallOutcome::Failure { agent_name, .. } => {
                agent_name
            }
        }
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            CallOutcome::Success { response, .. } => Some(response),
            CallOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&CallError> {
        match self {
            CallOutcome::Success { .. } => None,
            CallOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CallOutcome::Failure {
                error: CallError::Cancelled,
                ..
            }
        )
    }

    /// The response, or the failure as an `EnsembleError::Call`
    pub fn into_result(self) -> Result<String> {
        match self {
            CallOutcome::Success { response, .. } => Ok(response),
            CallOutcome::Failure {
                agent_id, error, ..
            } => Err(EnsembleError::Call {
                agent_id,
                source: error,
            }),
        }
    }
}

/// Render successful outcomes as `"<name>: <response>"` blocks
pub fn render_responses<'a>(outcomes: impl IntoIterator<Item = &'a CallOutcome>) -> String {
    outcomes
        .into_iter()
        .filter_map(|o| o.response().map(|r| format!("{}: {}", o.agent_name(), r)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Orchestration,
    Execution,
    Analysis,
    Review,
    Synthesis,
}

/// One stage of a session trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseResult {
    Orchestration {
        outcome: CallOutcome,
    },
    Execution {
        outcomes: Vec<CallOutcome>,
        plan: SessionPlan,
    },
    Analysis {
        outcomes: Vec<CallOutcome>,
    },
    Review {
        outcomes: Vec<CallOutcome>,
    },
    Synthesis {
        outcome: CallOutcome,
    },
}

impl PhaseResult {
    pub fn kind(&self) -> PhaseKind {
        match self {
            PhaseResult::Orchestration { .. } => PhaseKind::Orchestration,
            PhaseResult::Execution { .. } => PhaseKind::Execution,
            PhaseResult::Analysis { .. } => PhaseKind::Analysis,
            PhaseResult::Review { .. } => PhaseKind::Review,
            PhaseResult::Synthesis { .. } => PhaseKind::Synthesis,
        }
    }

    /// Every outcome in this phase, in trail order
    pub fn outcomes(&self) -> Vec<&CallOutcome> {
        match self {
            PhaseResult::Orchestration { outcome } | PhaseResult::Synthesis { outcome } => {
                vec![outcome]
            }
            PhaseResult::Execution { outcomes, .. }
            | PhaseResult::Analysis { outcomes }
            | PhaseResult::Review { outcomes } => outcomes.iter().collect(),
        }
    }

    pub fn plan(&self) -> Option<&SessionPlan> {
        match self {
            PhaseResult::Execution { plan, .. } => Some(plan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Collaborative,
    Orchestrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Cancelled,
}

/// Full phase trail of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub protocol: Protocol,
    pub task: String,
    pub status: SessionStatus,
    pub phases: Vec<PhaseResult>,
}

impl SessionReport {
    pub fn new(protocol: Protocol, task: impl Into<String>) -> Self {
        Self {
            protocol,
            task: task.into(),
            status: SessionStatus::Completed,
            phases: Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SessionStatus::Cancelled
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.kind() == kind)
    }

    /// Synthesis response, if the session got that far and it succeeded
    pub fn final_answer(&self) -> Option<&str> {
        match self.phase(PhaseKind::Synthesis)? {
            PhaseResult::Synthesis { outcome } => outcome.response(),
            _ => None,
        }
    }

    pub fn failed_calls(&self) -> usize {
        self.phases
            .iter()
            .flat_map(|p| p.outcomes())
            .filter(|o| !o.is_success())
            .count()
    }

    /// Errors for a cancelled session or a failed synthesis call
    ///
    /// Failures in earlier phases are tolerated; the trail keeps them.
    pub fn into_result(self) -> Result<SessionReport> {
        if self.is_cancelled() {
            return Err(EnsembleError::SessionCancelled);
        }
        if let Some(PhaseResult::Synthesis {
            outcome: CallOutcome::Failure {
                agent_id, error, ..
            },
        }) = self.phase(PhaseKind::Synthesis)
        {
            return Err(EnsembleError::Call {
                agent_id: agent_id.clone(),
                source: error.clone(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: &str, response: &str) -> CallOutcome {
        CallOutcome::Success {
            agent_id: id.to_string(),
            agent_name: id.to_uppercase(),
            response: response.to_string(),
        }
    }

    #[test]
    fn test_render_responses_skips_failures() {
        let outcomes = vec![
            ok("a", "first"),
            CallOutcome::Failure {
                agent_id: "b".into(),
                agent_name: "B".into(),
                error: CallError::Cancelled,
            },
            ok("c", "third"),
        ];
        assert_eq!(render_responses(&outcomes), "A: first\n\nC: third");
    }

    #[test]
    fn test_report_final_answer_and_failures() {
        let report = SessionReport {
            protocol: Protocol::Collaborative,
            task: "t".into(),
            status: SessionStatus::Completed,
            phases: vec![
                PhaseResult::Analysis {
                    outcomes: vec![ok("a", "x"), CallOutcome::Failure {
                        agent_id: "b".into(),
                        agent_name: "B".into(),
                        error: CallError::Cancelled,
                    }],
                },
                PhaseResult::Synthesis {
                    outcome: ok("a", "done"),
                },
            ],
        };

        assert_eq!(report.final_answer(), Some("done"));
        assert_eq!(report.failed_calls(), 1);
        assert!(!report.is_cancelled());
    }

    #[test]
    fn test_phase_serializes_with_tag() {
        let phase = PhaseResult::Synthesis {
            outcome: ok("a", "done"),
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["phase"], "synthesis");
        assert_eq!(json["outcome"]["status"], "success");
    }

    #[test]
    fn test_report_into_result() {
        let failed = CallOutcome::Failure {
            agent_id: "lead".into(),
            agent_name: "Lead".into(),
            error: CallError::Cancelled,
        };

        let mut report = SessionReport::new(Protocol::Orchestrated, "t");
        report.phases.push(PhaseResult::Synthesis {
            outcome: ok("lead", "done"),
        });
        assert_eq!(report.clone().into_result().unwrap(), report);

        report.phases[0] = PhaseResult::Synthesis {
            outcome: failed.clone(),
        };
        assert_eq!(
            report.clone().into_result().unwrap_err(),
            EnsembleError::Call {
                agent_id: "lead".into(),
                source: CallError::Cancelled,
            }
        );

        report.status = SessionStatus::Cancelled;
        assert_eq!(report.into_result().unwrap_err(), EnsembleError::SessionCancelled);

        assert_eq!(ok("a", "x").into_result().unwrap(), "x");
        assert!(matches!(
            failed.into_result(),
            Err(EnsembleError::Call { agent_id, .. }) if agent_id == "lead"
        ));
    }
}
