//! Anvil CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Anvil - tool execution and delegation diagnostics
#[derive(Parser, Debug)]
#[command(name = "anvil")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Working directory (default: current directory)
    #[arg(short = 'C', long)]
    cwd: Option<PathBuf>,

    /// Global settings file (default: ~/.anvil/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not start MCP servers
    #[arg(long)]
    no_servers: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect configured MCP servers and show their state
    Servers,
    /// List registered tools
    Tools {
        /// Exact name, glob (`fetch_*`) or regex (`re:^git_`)
        pattern: Option<String>,

        /// Only tools visible to this subagent profile
        #[arg(long)]
        subagent: Option<String>,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Explain the permission decision for a tool
    Check {
        tool: String,

        /// Delegation depth of the requester (0 = top level)
        #[arg(long, default_value = "0")]
        depth: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr, so command output stays clean)
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let working_dir = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let connect = !args.no_servers;
    let session = cli::Session::open(&working_dir, args.config, connect).await?;

    let result = match &args.command {
        Command::Servers => cli::servers(&session).await,
        Command::Tools {
            pattern,
            subagent,
            json,
        } => cli::tools(&session, pattern.as_deref(), subagent.as_deref(), *json).await,
        Command::Check { tool, depth } => cli::check(&session, tool, *depth).await,
    };

    session.close().await;
    result
}
