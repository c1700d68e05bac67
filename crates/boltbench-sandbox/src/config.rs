//! Shell configuration for the sandbox runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default workspace path inside the sandbox.
pub const DEFAULT_WORKDIR: &str = "/home/project";

/// How shell commands are spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell program.
    pub program: String,

    /// Arguments placed before the command text.
    pub args: Vec<String>,

    /// Extra environment for every spawned command.
    pub env: HashMap<String, String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let mut env = HashMap::new();
        // Answer npm prompts so installs never block on stdin
        env.insert("npm_config_yes".to_string(), "true".to_string());
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            env,
        }
    }
}

impl ShellConfig {
    /// Build the argv for running `command`.
    pub fn argv(&self, command: &str) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push(command.to_string());
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shell() {
        let shell = ShellConfig::default();
        assert_eq!(shell.argv("npm i"), vec!["-c", "npm i"]);
        assert_eq!(shell.env.get("npm_config_yes").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_deserialize_partial() {
        let shell: ShellConfig = serde_json::from_str(r#"{"program": "jsh"}"#).unwrap();
        assert_eq!(shell.program, "jsh");
        assert_eq!(shell.args, vec!["-c"]);
        assert!(shell.env.contains_key("npm_config_yes"));
    }
}
