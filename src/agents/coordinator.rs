//! Session Coordinator - the two multi-phase protocols
//!
//! Information Hiding:
//! - Phase ordering and the message sent in each phase
//! - Prompt assembly from registry snapshots
//! - Turning orchestrator output into an executable plan
//!
//! Collaborative: Analysis -> Review -> Synthesis (lead = first participant)
//! Orchestrated:  Distribute -> Execute -> Synthesize (via the orchestrator)
//!
//! Structural problems abort before any transport call. Everything after that
//! is recorded in the returned trail, including failed calls. Cancellation
//! returns the trail gathered so far with `SessionStatus::Cancelled`.

use crate::agents::executor::{AgentCall, SequencedExecutor};
use crate::agents::messages::{
    render_responses, CallOutcome, PhaseResult, Protocol, SessionReport, SessionStatus,
};
use crate::agents::plan::{Assignment, PlanParser};
use crate::agents::prompt::{PromptBuilder, TaskContext};
use crate::agents::registry::AgentRegistry;
use crate::config::SessionConfig;
use crate::error::{EnsembleError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SessionCoordinator {
    registry: Arc<AgentRegistry>,
    executor: SequencedExecutor,
    prompts: PromptBuilder,
    config: SessionConfig,
}

impl SessionCoordinator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        executor: SequencedExecutor,
        prompts: PromptBuilder,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            prompts,
            config,
        }
    }

    pub fn orchestrator_id(&self) -> &str {
        &self.config.orchestrator_id
    }

    /// Analysis and review fan out in parallel, then the lead synthesizes
    pub async fn run_collaborative<S: AsRef<str>>(
        &self,
        participants: &[S],
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let mut seen = HashSet::new();
        let participants: Vec<String> = participants
            .iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        for id in &participants {
            if !self.registry.contains(id).await {
                tracing::error!("[SessionCoordinator] Unknown participant '{}'", id);
                return Err(EnsembleError::AgentNotFound(id.clone()));
            }
        }

        if participants.len() < self.config.min_participants {
            tracing::error!(
                "[SessionCoordinator] Collaboration needs {} participants, got {}",
                self.config.min_participants,
                participants.len()
            );
            return Err(EnsembleError::InsufficientParticipants {
                required: self.config.min_participants,
                actual: participants.len(),
            });
        }

        let mut report = SessionReport::new(Protocol::Collaborative, task);
        tracing::info!(
            "[SessionCoordinator] Collaboration started with {} agents",
            participants.len()
        );

        // Analysis
        tracing::info!("[SessionCoordinator] Phase 1/3: analysis");
        let message = format!(
            "Analyze this task from the perspective of your role: {}",
            task
        );
        let calls = self.prepare_all(&participants, &message, context).await?;
        let analyses = self.executor.run_parallel(&calls, cancel).await;
        let analysis_text = render_responses(&analyses);
        report.phases.push(PhaseResult::Analysis { outcomes: analyses });
        if cancel.is_cancelled() {
            return Ok(cancelled(report));
        }

        // Review
        tracing::info!("[SessionCoordinator] Phase 2/3: review");
        let message = format!(
            "Read the analyses from the other agents and give feedback:\n\n{}",
            analysis_text
        );
        let calls = self.prepare_all(&participants, &message, context).await?;
        let reviews = self.executor.run_parallel(&calls, cancel).await;
        let review_text = render_responses(&reviews);
        report.phases.push(PhaseResult::Review { outcomes: reviews });
        if cancel.is_cancelled() {
            return Ok(cancelled(report));
        }

        // Synthesis
        let lead = &participants[0];
        tracing::info!("[SessionCoordinator] Phase 3/3: synthesis by '{}'", lead);
        let message = format!(
            "Based on all analyses and feedback, create the final solution for the task: {}\n\n\
             Analyses:\n{}\n\nFeedback:\n{}",
            task, analysis_text, review_text
        );
        let call = self.prepare(lead, &message, context).await?;
        let outcome = self.executor.call_one(&call, cancel).await;
        report.phases.push(PhaseResult::Synthesis { outcome });

        Ok(self.finish(report, cancel))
    }

    /// Orchestrator distributes, specialists execute in priority order, orchestrator synthesizes
    pub async fn run_orchestrated(
        &self,
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let orchestrator = self.config.orchestrator_id.as_str();
        if !self.registry.is_active(orchestrator).await {
            tracing::error!(
                "[SessionCoordinator] Orchestrator '{}' is not active",
                orchestrator
            );
            return Err(EnsembleError::OrchestratorInactive(orchestrator.to_string()));
        }

        let mut report = SessionReport::new(Protocol::Orchestrated, task);
        tracing::info!("[SessionCoordinator] Orchestrated session started");

        // Distribute
        tracing::info!("[SessionCoordinator] Phase 1/3: distribution by '{}'", orchestrator);
        let message = format!(
            "Analyze this task and distribute it among the suitable agents:\n\n{}",
            task
        );
        let call = self.prepare(orchestrator, &message, context).await?;
        let outcome = self.executor.call_one(&call, cancel).await;
        let plan_text = outcome.response().unwrap_or_default().to_string();
        if !outcome.is_success() {
            tracing::warn!("[SessionCoordinator] Distribution failed, continuing with fallback plan");
        }
        report.phases.push(PhaseResult::Orchestration { outcome });
        if cancel.is_cancelled() {
            return Ok(cancelled(report));
        }

        let known: Vec<String> = self
            .registry
            .list_agents()
            .await
            .iter()
            .map(|a| a.id.clone())
            .collect();
        let active: Vec<String> = self
            .registry
            .list_active()
            .await
            .iter()
            .map(|a| a.id.clone())
            .filter(|id| id != orchestrator)
            .collect();
        let plan = PlanParser::new(orchestrator, known).parse(&plan_text, &active, task);

        // Execute
        let ordered = plan.execution_order(orchestrator);
        tracing::info!(
            "[SessionCoordinator] Phase 2/3: execution of {} assignments",
            ordered.len()
        );
        // built per call so an agent with two assignments sees its first result
        let assignments = &ordered;
        let outcomes = self
            .executor
            .run_sequential_with(
                assignments.len(),
                move |index| {
                    let assignment: &Assignment = assignments[index];
                    self.prepare(&assignment.agent_id, &assignment.task, context)
                },
                cancel,
            )
            .await?;
        let results = render_responses(&outcomes);
        report.phases.push(PhaseResult::Execution { outcomes, plan });
        if cancel.is_cancelled() {
            return Ok(cancelled(report));
        }

        // Synthesize
        tracing::info!("[SessionCoordinator] Phase 3/3: synthesis by '{}'", orchestrator);
        let message = format!(
            "Combine the results of the agents into one coherent final solution.\n\n\
             Original task: {}\n\nResults from the agents:\n{}",
            task, results
        );
        let call = self.prepare(orchestrator, &message, context).await?;
        let outcome = self.executor.call_one(&call, cancel).await;
        report.phases.push(PhaseResult::Synthesis { outcome });

        Ok(self.finish(report, cancel))
    }

    /// Single ad hoc call outside any protocol
    pub async fn send_direct(
        &self,
        agent_id: &str,
        message: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<CallOutcome> {
        let call = self.prepare(agent_id, message, context).await?;
        Ok(self.executor.call_one(&call, cancel).await)
    }

    async fn prepare(&self, agent_id: &str, message: &str, context: &TaskContext) -> Result<AgentCall> {
        let snapshot = self
            .registry
            .snapshot(agent_id, self.prompts.history_window())
            .await?;
        let prompt = self
            .prompts
            .build(&snapshot.definition, &snapshot.history, message, context);
        Ok(AgentCall::new(agent_id, message, prompt))
    }

    async fn prepare_all(
        &self,
        agent_ids: &[String],
        message: &str,
        context: &TaskContext,
    ) -> Result<Vec<AgentCall>> {
        let mut calls = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            calls.push(self.prepare(id, message, context).await?);
        }
        Ok(calls)
    }

    fn finish(&self, report: SessionReport, cancel: &CancellationToken) -> SessionReport {
        if cancel.is_cancelled() {
            return cancelled(report);
        }
        tracing::info!(
            "[SessionCoordinator] Session completed: {} phases, {} failed calls",
            report.phases.len(),
            report.failed_calls()
        );
        report
    }
}

fn cancelled(mut report: SessionReport) -> SessionReport {
    tracing::info!(
        "[SessionCoordinator] Session cancelled after {} phases",
        report.phases.len()
    );
    report.status = SessionStatus::Cancelled;
    report
}
