//! Sequenced Executor - drives agent calls through the transport
//!
//! Information Hiding:
//! - Pacing between calls (inter-call delay, failure backoff) is internal
//! - History bookkeeping happens here, right after each call resolves
//! - Cancellation reaches both in-flight calls and pending delays
//!
//! A failing call never aborts its batch: it becomes a `CallOutcome::Failure`
//! and the agent's history is left untouched.

use crate::agents::messages::CallOutcome;
use crate::agents::registry::{AgentRegistry, ConversationTurn};
use crate::config::ExecutorConfig;
use crate::core::transport::{ModelSelector, TransportPort};
use crate::error::CallError;
use futures::future::{self, join_all};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// One prepared call: the prompt to send and the message to record
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCall {
    pub agent_id: String,
    /// User-facing message appended to history on success
    pub message: String,
    /// Fully built prompt sent to the transport
    pub prompt: String,
}

impl AgentCall {
    pub fn new(
        agent_id: impl Into<String>,
        message: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            message: message.into(),
            prompt: prompt.into(),
        }
    }
}

pub struct SequencedExecutor {
    registry: Arc<AgentRegistry>,
    transport: Arc<dyn TransportPort>,
    selector: Arc<dyn ModelSelector>,
    config: ExecutorConfig,
}

impl SequencedExecutor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        transport: Arc<dyn TransportPort>,
        selector: Arc<dyn ModelSelector>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            selector,
            config,
        }
    }

    /// Issue a single call and record its turns on success
    pub async fn call_one(&self, call: &AgentCall, cancel: &CancellationToken) -> CallOutcome {
        let Some(definition) = self.registry.get(&call.agent_id).await else {
            tracing::error!("[SequencedExecutor] Agent '{}' not found", call.agent_id);
            return CallOutcome::Failure {
                agent_id: call.agent_id.clone(),
                agent_name: call.agent_id.clone(),
                error: CallError::AgentNotFound {
                    agent_id: call.agent_id.clone(),
                },
            };
        };

        let failure = |error: CallError| CallOutcome::Failure {
            agent_id: definition.id.clone(),
            agent_name: definition.name.clone(),
            error,
        };

        if cancel.is_cancelled() {
            return failure(CallError::Cancelled);
        }

        let hint = self.selector.select_for(&call.agent_id);
        tracing::debug!(
            "[SequencedExecutor] Calling '{}' via {} ({} prompt chars)",
            call.agent_id,
            hint,
            call.prompt.len()
        );

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("[SequencedExecutor] Call to '{}' cancelled", call.agent_id);
                return failure(CallError::Cancelled);
            }
            result = self.transport.call(&call.prompt, &hint) => result,
        };

        match result {
            Ok(response) => {
                tracing::debug!(
                    "[SequencedExecutor] '{}' answered in {}ms",
                    call.agent_id,
                    started.elapsed().as_millis()
                );
                let turns = [
                    ConversationTurn::user(call.message.clone()),
                    ConversationTurn::agent(response.clone()),
                ];
                if let Err(e) = self.registry.append_turns(&call.agent_id, turns).await {
                    tracing::warn!("[SequencedExecutor] Could not record history: {}", e);
                }
                CallOutcome::Success {
                    agent_id: definition.id.clone(),
                    agent_name: definition.name.clone(),
                    response,
                }
            }
            Err(e) => {
                tracing::warn!("[SequencedExecutor] '{}' failed: {}", call.agent_id, e);
                failure(CallError::from(e))
            }
        }
    }

    /// Calls strictly one after another with pacing in between
    ///
    /// Stops early only on cancellation; calls never issued are omitted.
    pub async fn run_sequential(
        &self,
        calls: &[AgentCall],
        cancel: &CancellationToken,
    ) -> Vec<CallOutcome> {
        let prepared = self
            .run_sequential_with(
                calls.len(),
                |index| future::ready(Ok::<_, Infallible>(calls[index].clone())),
                cancel,
            )
            .await;
        match prepared {
            Ok(outcomes) => outcomes,
            Err(never) => match never {},
        }
    }

    /// Like `run_sequential`, but each call is built right before it is issued
    ///
    /// `prepare` sees history written by earlier calls of the same batch. An
    /// error from `prepare` ends the batch and is returned as is.
    pub async fn run_sequential_with<F, Fut, E>(
        &self,
        count: usize,
        mut prepare: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<CallOutcome>, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<AgentCall, E>>,
    {
        let mut outcomes = Vec::with_capacity(count);

        for index in 0..count {
            if cancel.is_cancelled() {
                break;
            }

            let call = prepare(index).await?;
            tracing::info!(
                "[SequencedExecutor] {} working ({}/{})",
                call.agent_id,
                index + 1,
                count
            );
            let outcome = self.call_one(&call, cancel).await;
            let pause = self.pause_after(&outcome);
            let cancelled = outcome.is_cancelled();
            outcomes.push(outcome);

            if cancelled {
                break;
            }

            let is_last = index + 1 == count;
            if !is_last && !pause.is_zero() {
                tracing::debug!(
                    "[SequencedExecutor] Waiting {}ms before next agent ({}/{} done)",
                    pause.as_millis(),
                    index + 1,
                    count
                );
                if !wait(pause, cancel).await {
                    break;
                }
            }
        }

        Ok(outcomes)
    }

    /// All calls concurrently; outcomes come back in input order
    pub async fn run_parallel(
        &self,
        calls: &[AgentCall],
        cancel: &CancellationToken,
    ) -> Vec<CallOutcome> {
        tracing::debug!("[SequencedExecutor] Fanning out {} calls", calls.len());
        join_all(calls.iter().map(|call| self.call_one(call, cancel))).await
    }

    fn pause_after(&self, outcome: &CallOutcome) -> Duration {
        match outcome.error() {
            None => Duration::from_millis(self.config.inter_call_delay_ms),
            Some(error) => {
                let backoff = self.config.failure_backoff_ms;
                let hinted = error.retry_after_ms().unwrap_or(0);
                if error.is_rate_limited() && hinted > backoff {
                    tracing::debug!(
                        "[SequencedExecutor] Provider asked to wait {}ms, extending backoff",
                        hinted
                    );
                }
                Duration::from_millis(backoff.max(hinted))
            }
        }
    }
}

/// Sleep unless cancelled first; returns false when cancelled
async fn wait(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builder::AgentBuilder;
    use crate::core::mock::ScriptedTransport;
    use crate::core::transport::{ModelHint, StaticModelSelector, TransportError};
    use crate::error::EnsembleError;

    async fn setup(
        transport: Arc<ScriptedTransport>,
        config: ExecutorConfig,
    ) -> (Arc<AgentRegistry>, SequencedExecutor) {
        let registry = Arc::new(AgentRegistry::new());
        for id in ["a", "b", "c", "d"] {
            registry
                .register(AgentBuilder::new(id).name(id.to_uppercase()).build())
                .await
                .unwrap();
        }
        let selector = Arc::new(StaticModelSelector::new(ModelHint::new("test", "model")));
        let executor = SequencedExecutor::new(registry.clone(), transport, selector, config);
        (registry, executor)
    }

    fn calls(ids: &[&str]) -> Vec<AgentCall> {
        ids.iter()
            .map(|id| AgentCall::new(*id, format!("task for {}", id), format!("PROMPT {}", id)))
            .collect()
    }

    fn no_delay() -> ExecutorConfig {
        ExecutorConfig {
            inter_call_delay_ms: 0,
            failure_backoff_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_failed_call_is_recorded_and_batch_continues() {
        let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
            if prompt == "PROMPT b" {
                Err(TransportError::Network("connection reset".into()))
            } else {
                Ok(format!("done: {}", prompt))
            }
        }));
        let (registry, executor) = setup(transport.clone(), no_delay()).await;

        let outcomes = executor
            .run_sequential(&calls(&["a", "b", "c"]), &CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());
        assert_eq!(transport.call_count(), 3);

        assert_eq!(registry.history("a").await.unwrap().len(), 2);
        assert!(registry.history("b").await.unwrap().is_empty());
        let c_history = registry.history("c").await.unwrap();
        assert_eq!(c_history[0].content, "task for c");
        assert_eq!(c_history[1].content, "done: PROMPT c");
    }

    #[tokio::test]
    async fn test_sequential_preserves_call_order() {
        let transport = Arc::new(ScriptedTransport::new(|prompt, _| Ok(prompt.to_string())));
        let (_, executor) = setup(transport.clone(), no_delay()).await;

        let outcomes = executor
            .run_sequential(&calls(&["c", "a", "b"]), &CancellationToken::new())
            .await;

        let ids: Vec<_> = outcomes.iter().map(|o| o.agent_id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        let prompts: Vec<_> = transport.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(prompts, vec!["PROMPT c", "PROMPT a", "PROMPT b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_call_delay_and_failure_backoff() {
        let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
            if prompt == "PROMPT a" {
                Err(TransportError::RateLimited {
                    message: "429".into(),
                    retry_after_ms: None,
                })
            } else {
                Ok("ok".into())
            }
        }));
        let (_, executor) = setup(transport, ExecutorConfig::default()).await;

        let start = tokio::time::Instant::now();
        let outcomes = executor
            .run_sequential(&calls(&["a", "b", "c"]), &CancellationToken::new())
            .await;

        // 5000 after the failure, 2000 after b, nothing after the last call
        assert_eq!(outcomes.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_hint_extends_backoff() {
        let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
            if prompt == "PROMPT a" {
                Err(TransportError::RateLimited {
                    message: "retry in 9s".into(),
                    retry_after_ms: Some(9000),
                })
            } else {
                Ok("ok".into())
            }
        }));
        let (_, executor) = setup(transport, ExecutorConfig::default()).await;

        let start = tokio::time::Instant::now();
        executor
            .run_sequential(&calls(&["a", "b"]), &CancellationToken::new())
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(9000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_batch() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("ok".into())));
        let (_, executor) = setup(transport.clone(), ExecutorConfig::default()).await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1000)).await;
            trigger.cancel();
        });

        let outcomes = executor.run_sequential(&calls(&["a", "b", "c"]), &cancel).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reaches_in_flight_call() {
        let transport = Arc::new(
            ScriptedTransport::new(|_, _| Ok("late".into())).with_latency(Duration::from_secs(30)),
        );
        let (registry, executor) = setup(transport, no_delay()).await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcomes = executor.run_sequential(&calls(&["a", "b"]), &cancel).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_cancelled());
        assert!(registry.history("a").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_runs_concurrently_in_input_order() {
        let transport = Arc::new(
            ScriptedTransport::new(|prompt, _| {
                if prompt == "PROMPT c" {
                    Err(TransportError::Auth("bad key".into()))
                } else {
                    Ok(prompt.to_lowercase())
                }
            })
            .with_latency(Duration::from_secs(3)),
        );
        let (_, executor) = setup(transport, ExecutorConfig::default()).await;

        let start = tokio::time::Instant::now();
        let outcomes = executor
            .run_parallel(&calls(&["a", "b", "c", "d"]), &CancellationToken::new())
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(3));
        let ids: Vec<_> = outcomes.iter().map(|o| o.agent_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 3);
        assert_eq!(outcomes[1].response(), Some("prompt b"));
    }

    #[tokio::test]
    async fn test_unknown_agent_becomes_failed_outcome() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("ok".into())));
        let (_, executor) = setup(transport.clone(), no_delay()).await;

        let outcome = executor
            .call_one(&AgentCall::new("ghost", "m", "p"), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome.error(),
            Some(CallError::AgentNotFound { agent_id }) if agent_id == "ghost"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lazy_prepare_sees_earlier_turns() {
        let transport = Arc::new(ScriptedTransport::new(|prompt, _| Ok(format!("re: {}", prompt))));
        let (registry, executor) = setup(transport.clone(), no_delay()).await;
        let registry_ref = &registry;

        let outcomes = executor
            .run_sequential_with(
                2,
                |index| async move {
                    let seen = registry_ref.history("a").await?.len();
                    Ok::<_, EnsembleError>(AgentCall::new(
                        "a",
                        format!("step {}", index),
                        format!("step {} after {} turns", index, seen),
                    ))
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        let prompts: Vec<_> = transport.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(prompts, vec!["step 0 after 0 turns", "step 1 after 2 turns"]);
    }

    #[tokio::test]
    async fn test_prepare_error_ends_batch() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("ok".into())));
        let (_, executor) = setup(transport.clone(), no_delay()).await;

        let result = executor
            .run_sequential_with(
                3,
                |index| async move {
                    if index == 1 {
                        Err(EnsembleError::AgentNotFound("ghost".into()))
                    } else {
                        Ok(AgentCall::new("a", "m", "p"))
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.unwrap_err(), EnsembleError::AgentNotFound("ghost".into()));
        assert_eq!(transport.call_count(), 1);
    }
}
