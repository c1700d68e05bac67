//! `boltbench replay`: stream a transcript into a workbench backed by the
//! passthrough runtime and run its actions on the host.

use super::{read_transcript, stream_prefixes};
use boltbench_core::bus::{ActionOutput, ActionStatusChanged};
use boltbench_core::parser::StreamingMessageParser;
use boltbench_core::workbench::status_counts;
use boltbench_core::{ActionState, ActionStatus, Config, Workbench};
use boltbench_sandbox::{PassthroughRuntime, SandboxHandle, SandboxRuntime};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

const PRINTER_DRAIN: Duration = Duration::from_secs(1);

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Transcript file (`-` for stdin)
    pub transcript: PathBuf,

    /// Host directory mapped to the sandbox workdir (defaults to the project directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Message id the transcript is parsed under
    #[arg(long, default_value = "msg_1")]
    pub message_id: String,

    /// Feed the transcript this many characters at a time
    #[arg(long, default_value_t = 32)]
    pub chunk_size: usize,

    /// Abort unfinished actions after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Do not print shell output
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn replay_transcript(
    config: &Config,
    project: &Path,
    args: ReplayArgs,
) -> anyhow::Result<()> {
    let text = read_transcript(&args.transcript)?;
    let host_root = args.workdir.clone().unwrap_or_else(|| project.to_path_buf());
    std::fs::create_dir_all(&host_root)?;

    let runner_config = config.runner_config();
    let runtime: Arc<dyn SandboxRuntime> =
        Arc::new(PassthroughRuntime::new(&host_root, &runner_config.workdir));
    info!(
        sandbox = runtime.id(),
        host_root = %host_root.display(),
        "Replaying transcript"
    );

    let workbench = Workbench::new(
        SandboxHandle::ready(runtime),
        runner_config,
        config.workbench_options(),
    );
    let printer = tokio::spawn(print_progress(
        workbench.bus().subscribe::<ActionStatusChanged>().await,
        workbench.bus().subscribe::<ActionOutput>().await,
        args.quiet,
    ));

    let bridge = workbench.attach_parser();
    let mut parser =
        StreamingMessageParser::with_callbacks(config.parser_options(), bridge.callbacks());
    for prefix in stream_prefixes(&text, args.chunk_size) {
        parser.parse(&args.message_id, prefix);
    }
    bridge.flush().await;
    drop(parser);
    bridge.shutdown().await;

    let states = settle(&workbench, args.timeout.map(Duration::from_secs)).await;
    // Dropping the workbench closes the bus, which lets the printer drain and exit
    drop(workbench);
    if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
        warn!("Progress printer did not finish");
    }

    print_summary(&states);
    let failed = states
        .iter()
        .filter(|s| s.status == ActionStatus::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} action(s) failed");
    }
    Ok(())
}

/// Wait for all actions, aborting them on Ctrl-C or when `limit` passes.
async fn settle(workbench: &Workbench, limit: Option<Duration>) -> Vec<ActionState> {
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        states = workbench.settle() => return states,
        _ = tokio::signal::ctrl_c() => warn!("Interrupted; aborting actions"),
        _ = deadline => warn!("Timed out; aborting actions"),
    }

    workbench.abort_all_actions().await;
    workbench.settle().await
}

async fn print_progress(
    mut statuses: broadcast::Receiver<ActionStatusChanged>,
    mut output: broadcast::Receiver<ActionOutput>,
    quiet: bool,
) {
    let (mut statuses_open, mut output_open) = (true, true);
    while statuses_open || output_open {
        tokio::select! {
            event = statuses.recv(), if statuses_open => match event {
                Ok(event) => println!("[{}] {}", event.action_id, event.status),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Status events lagged")
                }
                Err(broadcast::error::RecvError::Closed) => statuses_open = false,
            },
            event = output.recv(), if output_open => match event {
                Ok(event) if !quiet => print!("{}", event.chunk),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Output events lagged")
                }
                Err(broadcast::error::RecvError::Closed) => output_open = false,
            },
        }
    }
}

fn print_summary(states: &[ActionState]) {
    println!("---");
    for state in states {
        let action = state.action();
        let target = action.file_path().unwrap_or_else(|| action.content());
        println!(
            "{} {} {}: {}",
            state.action_id(),
            action.action_type(),
            target,
            state.status
        );
    }
    let counts: Vec<String> = status_counts(states)
        .into_iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect();
    println!("{} action(s): {}", states.len(), counts.join(", "));
}
