//! Configuration integration tests.
//!
//! Tests for configuration loading, saving, and wiring into the workbench.

use boltbench_core::config::{Config, RunnerSection};
use boltbench_core::{Action, ActionDescriptor, ArtifactDescriptor, CoreError, Workbench};
use boltbench_test_utils::{MockOp, MockSandbox, TestProject};
use std::time::Duration;

/// Test that JSONC comments are handled in the project config.
#[tokio::test]
async fn test_load_project_jsonc() {
    let project = TestProject::new()
        .with_config(
            r#"{
                // Keep a few messages only
                "parser": { "max_tracked_messages": 4 },
                /* Multi-line
                   comment */
                "workbench": { "follow_file_actions": false }
            }"#,
        )
        .build();

    let (config, sources) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.parser_options().max_tracked_messages, 4);
    assert!(!config.workbench_options().follow_file_actions);
    assert!(sources
        .iter()
        .any(|s| s.ends_with("boltbench.jsonc")));
}

/// The `.jsonc` file wins when both project files exist.
#[tokio::test]
async fn test_jsonc_preferred_over_json() {
    let project = TestProject::new()
        .with_file("boltbench.json", r#"{ "log_level": "error" }"#)
        .with_config(r#"{ "log_level": "trace" }"#)
        .build();

    let (config, _) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.log_level(), boltbench_util::LogLevel::Trace);
}

/// Test default config when no project file exists.
#[tokio::test]
async fn test_missing_config_file_is_io_error() {
    let project = TestProject::new().build();
    let err = Config::load_file(&project.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
}

#[tokio::test]
async fn test_default_config() {
    let project = TestProject::new().build();

    let (config, sources) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert!(!sources.iter().any(|s| s.starts_with(project.path())));
    assert!(config.runner.is_none() || config.runner_config().workdir.is_absolute());
}

/// Test config save and reload.
#[tokio::test]
async fn test_save_and_reload_config() {
    let project = TestProject::new().build();

    let config = Config {
        runner: Some(RunnerSection {
            shell: Some("bash".to_string()),
            fail_on_nonzero_exit: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    config
        .save(Some(project.path()))
        .await
        .expect("Failed to save config");

    let (loaded, _) = Config::load(Some(project.path()))
        .await
        .expect("Failed to reload config");

    assert_eq!(loaded.runner, config.runner);
    assert!(loaded.runner_config().fail_on_nonzero_exit);
}

/// Runner settings reach the sandbox.
#[tokio::test]
async fn test_runner_config_drives_spawn() {
    let config = Config::parse_jsonc(
        r#"{ "runner": { "shell": "bash", "shell_args": ["-lc"], "workdir": "/srv/app" } }"#,
        "inline",
    )
    .unwrap();

    let sandbox = MockSandbox::with_workdir("/srv/app");
    let workbench = Workbench::new(
        sandbox.handle(),
        config.runner_config(),
        config.workbench_options(),
    );
    workbench
        .add_artifact(&ArtifactDescriptor::new("msg_1", "api", "API"))
        .await;

    let file = ActionDescriptor::new(
        "msg_1",
        "api",
        "msg_1:0",
        Action::file("server.js", "listen()").unwrap(),
    );
    let shell = ActionDescriptor::new(
        "msg_1",
        "api",
        "msg_1:1",
        Action::shell("node server.js").unwrap(),
    );
    for action in [&file, &shell] {
        workbench.add_action(action).await.unwrap();
        workbench.run_action(action, false).unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), workbench.settle())
        .await
        .unwrap();

    let ops = sandbox.ops();
    assert!(ops.contains(&MockOp::Spawn {
        program: "bash".to_string(),
        args: vec!["-lc".to_string(), "node server.js".to_string()],
    }));
    assert_eq!(sandbox.file("/srv/app/server.js").as_deref(), Some("listen()\n"));
}
