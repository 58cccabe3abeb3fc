use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ensemble")]
#[command(author, version, about = "Run teams of role-bound LLM agents on a task", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use the offline echo transport instead of calling a provider
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory where session transcripts are saved
    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Transcript name when saving (default: timestamp)
    #[arg(long, global = true)]
    pub session_id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered agents and their capabilities
    Agents,

    /// Send one message to a single agent
    Ask {
        agent: String,
        message: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Collaborative session: analysis, review, synthesis by the first agent
    Collab {
        /// Participants, comma separated; the first one leads
        #[arg(short, long, value_delimiter = ',', required = true)]
        agents: Vec<String>,

        task: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Orchestrated session: the orchestrator plans, specialists execute
    Orchestrate {
        /// Specialists to activate, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        activate: Vec<String>,

        task: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Print a saved session transcript
    Show { session_id: String },
}

/// Task context attached to every prompt
#[derive(Args, Debug, Default)]
pub struct ContextArgs {
    /// File whose content is included as the current code
    #[arg(long)]
    pub code_file: Option<PathBuf>,

    /// Names of open files, comma separated
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    /// Error messages to include; repeat for several
    #[arg(long = "errors")]
    pub errors: Vec<String>,
}
