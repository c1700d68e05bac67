//! Boltbench - apply streamed assistant artifacts to a workspace.
//!
//! This is the main entry point for the boltbench CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::{init_logging, parse_transcript, replay_transcript, ParseArgs, ReplayArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "boltbench")]
#[command(
    author,
    version,
    about = "Streaming artifact parser and action runner",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory used for config lookup (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a transcript and print the rendered text and parse events
    Parse(ParseArgs),
    /// Stream a transcript into a workbench and run its actions
    Replay(ReplayArgs),
    /// Show configuration
    Config,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let project = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let (config, sources) = boltbench_core::Config::load(Some(&project)).await?;
    init_logging(cli.verbose, config.log_level());
    tracing::debug!(project = %project.display(), ?sources, "Starting boltbench");

    match cli.command {
        Commands::Parse(args) => parse_transcript(&config, args),
        Commands::Replay(args) => replay_transcript(&config, &project, args).await,
        Commands::Config => show_config(&config, &sources),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn show_config(config: &boltbench_core::Config, sources: &[PathBuf]) -> anyhow::Result<()> {
    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in sources {
            println!("  {}", source.display());
        }
    }
    println!();

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);

    Ok(())
}

/// Print version information.
fn print_version() {
    println!("boltbench {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Streams <boltArtifact> markup into sandboxed file writes and shell commands.");
}
