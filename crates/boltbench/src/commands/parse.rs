//! `boltbench parse`: run the streaming parser over a transcript.

use super::{read_transcript, stream_prefixes};
use boltbench_core::parser::{EventLog, ParserEvent, StreamingMessageParser};
use boltbench_core::{Action, Config};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Transcript file (`-` for stdin)
    pub transcript: PathBuf,

    /// Message id the transcript is parsed under
    #[arg(long, default_value = "msg_1")]
    pub message_id: String,

    /// Feed the transcript this many characters at a time
    #[arg(long, default_value_t = 32)]
    pub chunk_size: usize,

    /// Print events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn parse_transcript(config: &Config, args: ParseArgs) -> anyhow::Result<()> {
    let text = read_transcript(&args.transcript)?;
    let log = EventLog::new();
    let mut parser = StreamingMessageParser::with_callbacks(config.parser_options(), log.clone());

    let mut rendered = String::new();
    for prefix in stream_prefixes(&text, args.chunk_size) {
        rendered.push_str(&parser.parse(&args.message_id, prefix));
    }
    let events = log.events();
    tracing::debug!(events = events.len(), "Transcript parsed");

    if args.json {
        for event in &events {
            println!("{}", serde_json::to_string(&event_json(event))?);
        }
        println!("{}", json!({ "event": "output", "text": rendered }));
        return Ok(());
    }

    println!("{rendered}");
    println!("---");
    for event in &events {
        if let Some(line) = describe(event) {
            println!("{line}");
        }
    }
    Ok(())
}

fn event_json(event: &ParserEvent) -> serde_json::Value {
    match event {
        ParserEvent::ArtifactOpen(artifact) => {
            json!({ "event": "artifact-open", "artifact": artifact })
        }
        ParserEvent::ArtifactClose(artifact) => {
            json!({ "event": "artifact-close", "artifact": artifact })
        }
        ParserEvent::ActionOpen(action) => json!({ "event": "action-open", "action": action }),
        ParserEvent::ActionStream(action) => json!({ "event": "action-stream", "action": action }),
        ParserEvent::ActionClose(action) => json!({ "event": "action-close", "action": action }),
    }
}

/// One summary line per event; stream events are left out.
fn describe(event: &ParserEvent) -> Option<String> {
    let line = match event {
        ParserEvent::ArtifactOpen(a) => format!("artifact {} \"{}\" opened", a.id, a.title),
        ParserEvent::ArtifactClose(a) => format!("artifact {} closed", a.id),
        ParserEvent::ActionStream(_) | ParserEvent::ActionOpen(_) => return None,
        ParserEvent::ActionClose(d) => match &d.action {
            Action::Shell { content } => format!("  {} shell: {}", d.action_id, content),
            Action::File { file_path, content } => format!(
                "  {} file {} ({} bytes)",
                d.action_id,
                file_path,
                content.len()
            ),
        },
    };
    Some(line)
}
