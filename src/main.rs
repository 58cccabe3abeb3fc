use anyhow::{Context, Result};
use clap::Parser;
use ensemble::cli::{Cli, Commands, ContextArgs};
use ensemble::core::mock::EchoTransport;
use ensemble::storage::{FileSystemStorage, TranscriptStorage};
use ensemble::{utils, Ensemble, SessionReport, Settings, TaskContext};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_SESSIONS_DIR: &str = "./sessions";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().context("Failed to load configuration")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Show { session_id } = &cli.command {
        return handle_show(&cli, session_id).await;
    }

    let mut ensemble = if cli.offline {
        tracing::info!("Offline mode: agents echo their input");
        Ensemble::new(Arc::new(EchoTransport), &settings)
    } else {
        Ensemble::from_settings(&settings)?
    };
    if let Some(dir) = &cli.save_dir {
        let storage = FileSystemStorage::new(dir.clone()).await?;
        ensemble = ensemble.with_transcripts(Arc::new(storage));
    }
    ensemble.register_default_agents().await?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, cancelling session");
            trigger.cancel();
        }
    });

    match &cli.command {
        Commands::Agents => handle_agents(&cli, &ensemble).await,
        Commands::Ask {
            agent,
            message,
            context,
        } => handle_ask(&cli, &ensemble, agent, message, context, &cancel).await,
        Commands::Collab {
            agents,
            task,
            context,
        } => {
            let context = load_context(context).await?;
            let report = ensemble
                .run_collaborative_with_cancel(agents.as_slice(), task, &context, &cancel)
                .await?;
            finish_session(&cli, &ensemble, report).await
        }
        Commands::Orchestrate {
            activate,
            task,
            context,
        } => {
            let context = load_context(context).await?;
            activate_for_orchestration(&ensemble, &settings.session.orchestrator_id, activate)
                .await?;
            let report = ensemble
                .run_orchestrated_with_cancel(task, &context, &cancel)
                .await?;
            finish_session(&cli, &ensemble, report).await
        }
        Commands::Show { .. } => Ok(()),
    }
}

async fn load_context(args: &ContextArgs) -> Result<TaskContext> {
    let mut context = TaskContext::new();
    if let Some(path) = &args.code_file {
        let code = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read code file: {:?}", path))?;
        context = context.with_code(code);
    }
    if !args.files.is_empty() {
        context = context.with_open_files(args.files.iter().cloned());
    }
    if !args.errors.is_empty() {
        context = context.with_errors(args.errors.iter().cloned());
    }
    Ok(context)
}

/// Orchestrator plus the requested specialists, or everyone when none are named
async fn activate_for_orchestration(
    ensemble: &Ensemble,
    orchestrator_id: &str,
    requested: &[String],
) -> Result<()> {
    if requested.is_empty() {
        for agent in ensemble.list_agents().await {
            ensemble.activate(&agent.id).await?;
        }
    } else {
        ensemble.activate(orchestrator_id).await?;
        for (id, result) in ensemble.registry().activate_many(requested).await {
            result.with_context(|| format!("Cannot activate '{}'", id))?;
        }
    }
    Ok(())
}

async fn handle_agents(cli: &Cli, ensemble: &Ensemble) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ensemble.export_config().await)?);
        return Ok(());
    }

    utils::print_header("Agents");
    for agent in ensemble.list_agents().await {
        let active = ensemble.registry().is_active(&agent.id).await;
        utils::print_agent(&agent, active);
    }
    Ok(())
}

async fn handle_ask(
    cli: &Cli,
    ensemble: &Ensemble,
    agent: &str,
    message: &str,
    context: &ContextArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let context = load_context(context).await?;
    let outcome = ensemble
        .send_direct_with_cancel(agent, message, &context, cancel)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        utils::print_outcome(&outcome);
    }

    outcome.into_result()?;
    Ok(())
}

async fn finish_session(cli: &Cli, ensemble: &Ensemble, report: SessionReport) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        utils::print_report(&report);
    }

    if let Some(dir) = &cli.save_dir {
        let session_id = cli
            .session_id
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string());
        ensemble.save_transcript(&session_id, &report).await?;
        utils::print_success(&format!("Transcript saved as '{}' in {:?}", session_id, dir));
    }

    report.into_result()?;
    Ok(())
}

async fn handle_show(cli: &Cli, session_id: &str) -> Result<()> {
    let dir = cli
        .save_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR));
    let storage = FileSystemStorage::new(dir.clone()).await?;

    let Some(report) = storage.load(session_id).await? else {
        let known = storage.list_sessions().await?;
        utils::print_error(&format!("No session '{}' in {:?}", session_id, dir));
        if !known.is_empty() {
            utils::print_info(&format!("Saved sessions: {}", known.join(", ")));
        }
        anyhow::bail!("session not found");
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        utils::print_report(&report);
    }
    Ok(())
}
