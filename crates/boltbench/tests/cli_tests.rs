//! CLI integration tests.
//!
//! These tests exercise the CLI commands end-to-end.

use boltbench_test_utils::fixtures::transcripts;
use boltbench_test_utils::TestProject;
use std::path::Path;
use std::process::{Command, Output};

const DEMO: &str = r#"Writing a file, then copying it.
<boltArtifact id="demo" title="Demo">
<boltAction type="file" filePath="src/hello.txt">hello</boltAction>
<boltAction type="shell">cp src/hello.txt copy.txt</boltAction>
</boltArtifact>"#;

fn boltbench(project: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_boltbench"))
        .args(args)
        .arg("--project")
        .arg(project)
        .current_dir(project)
        .env_remove("BOLTBENCH_CONFIG_CONTENT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_version_command() {
    let project = TestProject::new().build();
    let output = boltbench(project.path(), &["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("boltbench"));
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_boltbench"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["parse", "replay", "config"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn test_parse_command() {
    let project = TestProject::new()
        .with_transcript("simple.md", transcripts::SIMPLE)
        .build();
    let output = boltbench(project.path(), &["parse", "simple.md", "--chunk-size", "5"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("I'll create a small script for you."));
    assert!(stdout.contains(r#"data-message-id="msg_1""#));
    assert!(stdout.contains(r#"artifact hello-script "Hello script" opened"#));
    assert!(stdout.contains("msg_1:0 file index.js"));
    assert!(stdout.contains("msg_1:1 shell: node index.js"));
    assert!(!stdout.contains("<boltAction"));
}

#[test]
fn test_parse_command_json() {
    let project = TestProject::new()
        .with_transcript("simple.md", transcripts::SIMPLE)
        .build();
    let output = boltbench(project.path(), &["parse", "simple.md", "--json"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();

    assert_eq!(events.first().unwrap()["event"], "artifact-open");
    let last = events.last().unwrap();
    assert_eq!(last["event"], "output");
    assert!(last["text"]
        .as_str()
        .unwrap()
        .ends_with("Run it whenever you like."));
}

#[test]
fn test_replay_applies_actions() {
    let project = TestProject::new().with_transcript("demo.md", DEMO).build();
    let output = boltbench(project.path(), &["replay", "demo.md", "--chunk-size", "3"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert_eq!(project.read_file("src/hello.txt"), "hello\n");
    assert_eq!(project.read_file("copy.txt"), "hello\n");
    assert!(stdout.contains("2 action(s): 2 complete"));
}

#[test]
fn test_replay_reports_failed_actions() {
    let project = TestProject::new()
        .with_config(r#"{ "runner": { "fail_on_nonzero_exit": true } }"#)
        .with_transcript(
            "fail.md",
            concat!(
                r#"<boltArtifact id="f" title="Fails">"#,
                r#"<boltAction type="shell">exit 3</boltAction></boltArtifact>"#,
            ),
        )
        .build();
    let output = boltbench(project.path(), &["replay", "fail.md", "--quiet"]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("msg_1:0 shell exit 3: failed"));
    assert!(stderr.contains("1 action(s) failed"));
}

#[test]
fn test_replay_timeout_aborts_long_commands() {
    let project = TestProject::new()
        .with_transcript(
            "serve.md",
            concat!(
                r#"<boltArtifact id="s" title="Server">"#,
                r#"<boltAction type="shell">sleep 30</boltAction></boltArtifact>"#,
            ),
        )
        .build();
    let output = boltbench(project.path(), &["replay", "serve.md", "--timeout", "1"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 action(s): 1 aborted"));
}

#[test]
fn test_config_command_lists_project_source() {
    let project = TestProject::new()
        .with_config(r#"{ "parser": { "max_tracked_messages": 8 } }"#)
        .build();
    let output = boltbench(project.path(), &["config"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("boltbench.jsonc"));
    assert!(stdout.contains("\"max_tracked_messages\": 8"));
}
