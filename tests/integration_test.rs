//! End-to-end session tests
//!
//! These run against scripted transports, no API keys required.

use ensemble::core::mock::ScriptedTransport;
use ensemble::{
    AgentBuilder, Ensemble, EnsembleError, ModelHint, PhaseKind, PlanParser, Settings,
    SessionStatus, TaskContext, TransportError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PLAN: &str = r#"{"analysis":"split work","agents":[{"agent":"frontend","task":"build form markup","priority":1},{"agent":"backend","task":"validate fields","priority":2}]}"#;

fn fast_settings() -> Settings {
    let mut settings = Settings::defaults().unwrap();
    settings.executor.inter_call_delay_ms = 0;
    settings.executor.failure_backoff_ms = 0;
    settings
}

async fn login_team(transport: Arc<ScriptedTransport>) -> Ensemble {
    let ensemble = Ensemble::new(transport, &fast_settings());
    for (id, name) in [
        ("orchestrator", "Orchestrator"),
        ("frontend", "Frontend"),
        ("backend", "Backend"),
    ] {
        ensemble
            .register_agent(AgentBuilder::new(id).name(name).build())
            .await
            .unwrap();
        ensemble.activate(id).await.unwrap();
    }
    ensemble
}

/// The message this call sends, without the history replayed before it
fn new_message(prompt: &str) -> &str {
    prompt.rsplit_once("User: ").map_or(prompt, |(_, message)| message)
}

fn is_distribution(prompt: &str) -> bool {
    new_message(prompt).contains("distribute it among the suitable agents")
}

#[tokio::test]
async fn test_orchestrated_session_follows_plan() {
    let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
        if is_distribution(prompt) {
            Ok(format!("Here is my plan:\n{}", PLAN))
        } else if prompt.ends_with("Frontend:") {
            Ok("<form>...</form>".to_string())
        } else if prompt.ends_with("Backend:") {
            Ok("validate(email, password)".to_string())
        } else {
            Ok("final login form".to_string())
        }
    }));
    let ensemble = login_team(transport.clone()).await;

    let report = ensemble
        .run_orchestrated("build a login form", &TaskContext::new())
        .await
        .unwrap();

    let kinds: Vec<_> = report.phases.iter().map(|p| p.kind()).collect();
    assert_eq!(
        kinds,
        vec![PhaseKind::Orchestration, PhaseKind::Execution, PhaseKind::Synthesis]
    );
    assert_eq!(report.status, SessionStatus::Completed);

    let execution = report.phase(PhaseKind::Execution).unwrap();
    let order: Vec<_> = execution.outcomes().iter().map(|o| o.agent_id().to_string()).collect();
    assert_eq!(order, vec!["frontend", "backend"]);
    assert!(!execution.plan().unwrap().is_fallback());

    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[1].prompt.contains("User: build form markup"));
    assert!(calls[2].prompt.contains("User: validate fields"));
    let synthesis = &calls[3].prompt;
    assert!(synthesis.contains("Original task: build a login form"));
    assert!(synthesis.contains("Frontend: <form>...</form>"));
    assert!(synthesis.contains("Backend: validate(email, password)"));
    assert!(synthesis.contains("distribute it among the suitable agents"));
    assert_eq!(report.final_answer(), Some("final login form"));
}

#[test]
fn test_new_message_ignores_replayed_history() {
    let prompt = "Conversation history:\nUser: Analyze this task and distribute it among the suitable agents\nOrchestrator: plan\n\nUser: Combine the results\n\nOrchestrator:";

    assert!(new_message(prompt).starts_with("Combine the results"));
    assert!(!is_distribution(prompt));
    assert!(is_distribution("User: Analyze this task and distribute it among the suitable agents:\n\nx\n\nOrchestrator:"));
}

#[tokio::test]
async fn test_orchestrated_prose_uses_fallback_plan() {
    let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
        if is_distribution(prompt) {
            Ok("Frontend should do the form and backend the checks.".to_string())
        } else {
            Ok("done".to_string())
        }
    }));
    let ensemble = login_team(transport).await;

    let report = ensemble
        .run_orchestrated("build a login form", &TaskContext::new())
        .await
        .unwrap();

    assert_eq!(report.phases.len(), 3);
    let plan = report.phase(PhaseKind::Execution).unwrap().plan().unwrap();
    assert!(plan.is_fallback());
    let assignments: Vec<_> = plan
        .assignments
        .iter()
        .map(|a| (a.agent_id.as_str(), a.task.as_str(), a.priority))
        .collect();
    assert_eq!(
        assignments,
        vec![
            ("frontend", "build a login form", 1),
            ("backend", "build a login form", 2)
        ]
    );
}

#[tokio::test]
async fn test_structural_errors_issue_no_calls() {
    let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("unused".to_string())));
    let ensemble = login_team(transport.clone()).await;

    let err = ensemble
        .run_collaborative(&["frontend"], "task", &TaskContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EnsembleError::InsufficientParticipants { .. }));

    ensemble.deactivate("orchestrator").await.unwrap();
    let err = ensemble
        .run_orchestrated("task", &TaskContext::new())
        .await
        .unwrap_err();
    assert_eq!(err, EnsembleError::OrchestratorInactive("orchestrator".into()));

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_activation_errors_and_idempotence() {
    let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("x".to_string())));
    let ensemble = login_team(transport).await;

    assert_eq!(
        ensemble.activate("ghost").await.unwrap_err(),
        EnsembleError::AgentNotFound("ghost".into())
    );
    assert_eq!(
        ensemble.deactivate("ghost").await.unwrap_err(),
        EnsembleError::AgentNotFound("ghost".into())
    );

    let before = ensemble.stats().await;
    ensemble.activate("frontend").await.unwrap();
    assert_eq!(ensemble.stats().await, before);
    assert_eq!(before.active, 3);
}

#[tokio::test]
async fn test_collaborative_partial_failure_keeps_trail() {
    let transport = Arc::new(ScriptedTransport::new(|prompt, _| {
        if prompt.ends_with("Backend:") && prompt.contains("give feedback") {
            Err(TransportError::RateLimited {
                message: "429".into(),
                retry_after_ms: None,
            })
        } else {
            Ok("ok".to_string())
        }
    }));
    let ensemble = login_team(transport.clone()).await;

    let report = ensemble
        .run_collaborative(&["frontend", "backend"], "build a login form", &TaskContext::new())
        .await
        .unwrap();

    assert_eq!(report.phases.len(), 3);
    assert_eq!(report.failed_calls(), 1);
    assert_eq!(report.final_answer(), Some("ok"));
    // backend: analysis recorded, failed review left out
    assert_eq!(ensemble.history("backend").await.unwrap().len(), 2);
    assert_eq!(ensemble.history("frontend").await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_context_reaches_every_prompt() {
    let transport = Arc::new(ScriptedTransport::new(|_, _| Ok("ok".to_string())));
    let ensemble = login_team(transport.clone()).await;
    let context = TaskContext::new()
        .with_code("fn main() {}")
        .with_errors(["error[E0425]: cannot find value `x`"]);

    ensemble
        .run_collaborative(&["frontend", "backend"], "fix it", &context)
        .await
        .unwrap();

    for call in transport.calls() {
        assert!(call.prompt.contains("Current code:\n```\nfn main() {}\n```"));
        assert!(call.prompt.contains("Errors:\nerror[E0425]"));
        assert!(!call.prompt.contains("Open files:"));
        assert_eq!(call.hint, ModelHint::new("openai", "gpt-4o-mini"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_orchestration_returns_partial_trail() {
    let transport = Arc::new(
        ScriptedTransport::new(|prompt, _| {
            if is_distribution(prompt) {
                Ok(PLAN.to_string())
            } else {
                Ok("working".to_string())
            }
        })
        .with_latency(Duration::from_secs(5)),
    );
    let mut settings = Settings::defaults().unwrap();
    settings.executor.inter_call_delay_ms = 2000;
    let ensemble = Ensemble::new(transport.clone(), &settings);
    for id in ["orchestrator", "frontend", "backend"] {
        ensemble
            .register_agent(AgentBuilder::new(id).build())
            .await
            .unwrap();
        ensemble.activate(id).await.unwrap();
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // distribution ends at 5s, frontend at 10s, then the 2s pause
        tokio::time::sleep(Duration::from_secs(11)).await;
        trigger.cancel();
    });

    let report = ensemble
        .run_orchestrated_with_cancel("build a login form", &TaskContext::new(), &cancel)
        .await
        .unwrap();

    assert!(report.is_cancelled());
    assert_eq!(report.phases.len(), 2);
    let execution = report.phase(PhaseKind::Execution).unwrap();
    assert_eq!(execution.outcomes().len(), 1);
    assert_eq!(execution.outcomes()[0].agent_id(), "frontend");
    assert_eq!(transport.call_count(), 2);
}

#[test]
fn test_plan_parser_fallback_covers_active_agents() {
    let parser = PlanParser::new("orchestrator", ["frontend", "backend", "tester"]);
    let active = vec!["frontend".to_string(), "backend".to_string(), "tester".to_string()];

    let plan = parser.parse("no structure at all", &active, "write docs");

    assert_eq!(plan.assignments.len(), active.len());
    assert!(plan.assignments.iter().all(|a| a.task == "write docs"));
}
