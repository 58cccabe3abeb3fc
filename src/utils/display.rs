use crate::agents::messages::{CallOutcome, PhaseKind, PhaseResult, SessionReport};
use crate::agents::registry::AgentDefinition;
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_agent(agent: &AgentDefinition, active: bool) {
    let marker = if active { "●".green() } else { "○".dimmed() };
    let icon = agent.icon.as_deref().unwrap_or(" ");
    println!(
        "{} {} {} ({})",
        marker,
        icon,
        agent.name.bold(),
        agent.id.dimmed()
    );
    println!("     {}", agent.role);
    if !agent.capabilities.is_empty() {
        println!("     {}", agent.capabilities.join(", ").yellow());
    }
}

pub fn print_outcome(outcome: &CallOutcome) {
    match outcome {
        CallOutcome::Success {
            agent_name,
            response,
            ..
        } => {
            println!("{}", format!("{}:", agent_name).green().bold());
            println!("{}\n", response);
        }
        CallOutcome::Failure {
            agent_name, error, ..
        } => {
            println!("{} {}\n", format!("{} failed:", agent_name).red().bold(), error);
        }
    }
}

fn phase_title(kind: PhaseKind) -> &'static str {
    match kind {
        PhaseKind::Orchestration => "Orchestration",
        PhaseKind::Execution => "Execution",
        PhaseKind::Analysis => "Analysis",
        PhaseKind::Review => "Review",
        PhaseKind::Synthesis => "Synthesis",
    }
}

fn print_phase(index: usize, phase: &PhaseResult) {
    println!(
        "\n{}",
        format!("── Phase {}: {} ──", index + 1, phase_title(phase.kind()))
            .bright_magenta()
            .bold()
    );

    if let Some(plan) = phase.plan() {
        if plan.is_fallback() {
            print_info("Orchestrator gave no structured plan, task sent to all active agents");
        }
        for assignment in plan.execution_order("") {
            println!(
                "  {} {} → {}",
                format!("#{}", assignment.priority).dimmed(),
                assignment.agent_id.cyan(),
                assignment.task
            );
        }
        println!();
    }

    for outcome in phase.outcomes() {
        print_outcome(outcome);
    }
}

/// Render a full session trail
pub fn print_report(report: &SessionReport) {
    print_header(&format!("{:?} session: {}", report.protocol, report.task));

    for (index, phase) in report.phases.iter().enumerate() {
        print_phase(index, phase);
    }

    let failed = report.failed_calls();
    if report.is_cancelled() {
        print_error("Session cancelled, showing partial results");
    } else if failed > 0 {
        print_error(&format!("Session finished with {} failed calls", failed));
    } else {
        print_success("Session completed");
    }
}
