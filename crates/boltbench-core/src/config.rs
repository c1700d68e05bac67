//! Configuration management for boltbench.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/boltbench/config.json`
//! 2. Environment variable: `BOLTBENCH_CONFIG_CONTENT`
//! 3. Project config: `boltbench.jsonc` or `boltbench.json` in the project directory
//!
//! Supports JSONC (JSON with comments) and variable substitution in files:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use crate::parser::ParserOptions;
use crate::runner::RunnerConfig;
use crate::workbench::WorkbenchOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable holding inline JSONC config.
pub const CONFIG_CONTENT_ENV: &str = "BOLTBENCH_CONFIG_CONTENT";

static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbench: Option<WorkbenchConfig>,
}

/// Log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for boltbench_util::LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// Parser settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Bound on per-message parser state (0 = unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tracked_messages: Option<usize>,
}

impl ParserConfig {
    pub fn merge(self, other: Self) -> Self {
        Self {
            max_tracked_messages: merge_option(
                self.max_tracked_messages,
                other.max_tracked_messages,
            ),
        }
    }
}

/// Runner settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Sandbox workdir that relative file paths resolve against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    /// Shell program for shell actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Arguments placed before the command text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_args: Option<Vec<String>>,

    /// Extra environment for shell actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    /// Fail shell actions that exit non-zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_on_nonzero_exit: Option<bool>,

    /// Fail file actions whose mkdir/write fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_errors_fatal: Option<bool>,
}

impl RunnerSection {
    pub fn merge(self, other: Self) -> Self {
        Self {
            workdir: merge_option(self.workdir, other.workdir),
            shell: merge_option(self.shell, other.shell),
            shell_args: merge_option(self.shell_args, other.shell_args),
            env: merge_hashmap(self.env, other.env),
            fail_on_nonzero_exit: merge_option(
                self.fail_on_nonzero_exit,
                other.fail_on_nonzero_exit,
            ),
            file_errors_fatal: merge_option(self.file_errors_fatal, other.file_errors_fatal),
        }
    }
}

/// Workbench settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Select written files and switch to the code view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_file_actions: Option<bool>,
}

impl WorkbenchConfig {
    pub fn merge(self, other: Self) -> Self {
        Self {
            follow_file_actions: merge_option(self.follow_file_actions, other.follow_file_actions),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/boltbench/`
    /// 2. `BOLTBENCH_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "boltbench.json", "boltbench.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var(CONFIG_CONTENT_ENV) {
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            for name in &["boltbench.jsonc", "boltbench.json"] {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        tracing::debug!(sources = ?sources, "Configuration loaded");
        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix, prefers `~/.config/boltbench` over the platform directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("boltbench");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        dirs::config_dir().map(|d| d.join("boltbench"))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Save to `{project_dir}/boltbench.json`, or the global config file.
    pub async fn save(&self, project_dir: Option<&Path>) -> CoreResult<PathBuf> {
        let path = match project_dir {
            Some(dir) => dir.join("boltbench.json"),
            None => {
                let global_dir = Self::global_config_dir().ok_or_else(|| {
                    ConfigError::InvalidPath("Could not determine config directory".to_string())
                })?;
                tokio::fs::create_dir_all(&global_dir).await?;
                global_dir.join("config.json")
            }
        };

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tokio::fs::write(&path, content).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(path)
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip `//` and `/* */` comments outside of strings.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }
            if in_string {
                match c {
                    '\\' => escape_next = true,
                    '"' => in_string = false,
                    _ => {}
                }
                result.push(c);
                continue;
            }

            match (c, chars.peek()) {
                ('"', _) => {
                    in_string = true;
                    result.push(c);
                }
                ('/', Some('/')) => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                ('/', Some('*')) => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Keep line numbers stable for error messages
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                }
                _ => result.push(c),
            }
        }

        result
    }

    /// Apply `{env:NAME}` and `{file:path}` substitutions. File paths are
    /// relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex().captures_iter(content) {
            let (Some(full), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => std::env::var(value).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value);
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result = result.replace(full.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        self.schema = merge_option(self.schema, other.schema);
        self.log_level = merge_option(self.log_level, other.log_level);
        self.parser = merge_nested(self.parser, other.parser, ParserConfig::merge);
        self.runner = merge_nested(self.runner, other.runner, RunnerSection::merge);
        self.workbench = merge_nested(self.workbench, other.workbench, WorkbenchConfig::merge);
        self
    }

    /// Effective log level (warn when unset).
    pub fn log_level(&self) -> boltbench_util::LogLevel {
        self.log_level
            .map(Into::into)
            .unwrap_or(boltbench_util::LogLevel::Warn)
    }

    pub fn parser_options(&self) -> ParserOptions {
        let mut options = ParserOptions::default();
        if let Some(max) = self.parser.as_ref().and_then(|p| p.max_tracked_messages) {
            options.max_tracked_messages = max;
        }
        options
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::default();
        let Some(section) = self.runner.clone() else {
            return config;
        };

        if let Some(workdir) = section.workdir {
            config.workdir = PathBuf::from(workdir);
        }
        if let Some(program) = section.shell {
            config.shell.program = program;
        }
        if let Some(args) = section.shell_args {
            config.shell.args = args;
        }
        config.shell.env.extend(section.env.unwrap_or_default());
        config.fail_on_nonzero_exit = section.fail_on_nonzero_exit.unwrap_or(false);
        config.file_errors_fatal = section.file_errors_fatal.unwrap_or(false);
        config
    }

    pub fn workbench_options(&self) -> WorkbenchOptions {
        let mut options = WorkbenchOptions::default();
        if let Some(follow) = self.workbench.as_ref().and_then(|w| w.follow_file_actions) {
            options.follow_file_actions = follow;
        }
        options
    }
}

fn merge_option<T>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (_, Some(o)) => Some(o),
        (b, None) => b,
    }
}

fn merge_nested<T>(base: Option<T>, other: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (base, other) {
        (Some(b), Some(o)) => Some(merge(b, o)),
        (b, None) => b,
        (None, o) => o,
    }
}

fn merge_hashmap<K: std::hash::Hash + Eq, V>(
    base: Option<HashMap<K, V>>,
    other: Option<HashMap<K, V>>,
) -> Option<HashMap<K, V>> {
    match (base, other) {
        (Some(mut b), Some(o)) => {
            b.extend(o);
            Some(b)
        }
        (b, None) => b,
        (None, o) => o,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // Line comment
            "shell": "bash", // trailing comment
            /* block comment */
            "path": "a//b/*not a comment*/c"
        }"#;

        let result = Config::strip_comments(input);
        assert!(!result.contains("Line comment"));
        assert!(!result.contains("trailing comment"));
        assert!(!result.contains("block comment"));
        assert!(result.contains("a//b/*not a comment*/c"));
    }

    #[test]
    fn test_parse_jsonc() {
        let input = r#"{
            // verbose while debugging transcripts
            "log_level": "debug",
            "parser": { "max_tracked_messages": 16 },
            "runner": { "shell": "bash", "fail_on_nonzero_exit": true }
        }"#;

        let config = Config::parse_jsonc(input, "test").unwrap();
        assert_eq!(config.log_level, Some(LogLevel::Debug));
        assert_eq!(config.parser_options().max_tracked_messages, 16);

        let runner = config.runner_config();
        assert_eq!(runner.shell.program, "bash");
        assert_eq!(runner.shell.args, ["-c"]);
        assert!(runner.fail_on_nonzero_exit);
        assert!(!runner.file_errors_fatal);
    }

    #[test]
    fn test_invalid_json_reports_source() {
        let err = Config::parse_jsonc("{ nope", "boltbench.jsonc").unwrap_err();
        assert!(err.to_string().contains("boltbench.jsonc"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level(), boltbench_util::LogLevel::Warn);
        assert_eq!(config.runner_config(), RunnerConfig::default());
        assert!(config.workbench_options().follow_file_actions);
        assert_eq!(
            config.parser_options().max_tracked_messages,
            crate::parser::DEFAULT_MAX_TRACKED_MESSAGES
        );
    }

    #[test]
    fn test_merge_config() {
        let base = Config {
            log_level: Some(LogLevel::Info),
            runner: Some(RunnerSection {
                shell: Some("bash".to_string()),
                env: Some(HashMap::from([("A".to_string(), "1".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let other = Config {
            runner: Some(RunnerSection {
                env: Some(HashMap::from([("B".to_string(), "2".to_string())])),
                file_errors_fatal: Some(true),
                ..Default::default()
            }),
            workbench: Some(WorkbenchConfig {
                follow_file_actions: Some(false),
            }),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.log_level, Some(LogLevel::Info));
        assert!(!merged.workbench_options().follow_file_actions);

        let runner = merged.runner_config();
        assert_eq!(runner.shell.program, "bash");
        assert!(runner.file_errors_fatal);
        assert_eq!(runner.shell.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(runner.shell.env.get("B").map(String::as_str), Some("2"));
        // The default npm env survives extra variables
        assert_eq!(
            runner.shell.env.get("npm_config_yes").map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_load_project_file_with_substitution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shell.txt"), "zsh\n").unwrap();
        std::fs::write(
            dir.path().join("boltbench.jsonc"),
            r#"{
                // picked up from a sibling file
                "runner": { "shell": "{file:shell.txt}", "workdir": "/workspace" }
            }"#,
        )
        .unwrap();

        let (config, sources) = Config::load(Some(dir.path())).await.unwrap();
        assert!(sources.contains(&dir.path().join("boltbench.jsonc")));

        let runner = config.runner_config();
        assert_eq!(runner.shell.program, "zsh");
        assert_eq!(runner.workdir, PathBuf::from("/workspace"));
    }

    #[tokio::test]
    async fn test_missing_env_substitution_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boltbench.json");
        std::fs::write(
            &path,
            r#"{ "runner": { "shell": "{env:BOLTBENCH_TEST_SURELY_UNSET_VAR}" } }"#,
        )
        .unwrap();

        let err = Config::load_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("BOLTBENCH_TEST_SURELY_UNSET_VAR"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            parser: Some(ParserConfig {
                max_tracked_messages: Some(0),
            }),
            ..Default::default()
        };

        let path = config.save(Some(dir.path())).await.unwrap();
        let loaded = Config::load_file(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
