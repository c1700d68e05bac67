//! Test fixtures: temporary project directories and assistant transcripts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory with configurable files.
///
/// The directory is removed when the built project is dropped.
///
/// ```rust
/// use boltbench_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("package.json", "{}")
///     .with_config(r#"{ "runner": { "shell": "bash" } }"#)
///     .build();
///
/// assert!(project.file_exists("boltbench.jsonc"));
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    files: HashMap<PathBuf, String>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: HashMap::new(),
        }
    }

    /// Add a file; the path is relative to the project root.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add a `boltbench.jsonc` config file.
    pub fn with_config(self, config: &str) -> Self {
        self.with_file("boltbench.jsonc", config)
    }

    /// Add a transcript file.
    pub fn with_transcript(self, name: &str, transcript: &str) -> Self {
        self.with_file(name, transcript)
    }

    pub fn build(self) -> BuiltTestProject {
        let root = self.temp_dir.path();
        for (path, contents) in &self.files {
            let full_path = root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!("Failed to create directory {}: {}", parent.display(), e)
                });
            }
            fs::write(&full_path, contents)
                .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
        }

        BuiltTestProject {
            temp_dir: self.temp_dir,
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A project whose files exist on disk.
pub struct BuiltTestProject {
    temp_dir: TempDir,
}

impl BuiltTestProject {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path.as_ref()).exists()
    }
}

/// Assistant transcripts in the artifact markup.
pub mod transcripts {
    /// No markup at all.
    pub const PLAIN: &str = "Sure! Rust's ownership rules mean every value has one owner.\n";

    /// One artifact with a file and a shell action, surrounded by prose.
    pub const SIMPLE: &str = r#"I'll create a small script for you.

<boltArtifact id="hello-script" title="Hello script">
<boltAction type="file" filePath="index.js">
console.log('hello');
</boltAction>
<boltAction type="shell">
node index.js
</boltAction>
</boltArtifact>

Run it whenever you like."#;

    /// Prose left once the markup of [`SIMPLE`] is stripped.
    pub const SIMPLE_PROSE: [&str; 2] = [
        "I'll create a small script for you.\n\n",
        "\n\nRun it whenever you like.",
    ];

    /// Files in nested folders followed by an install and a dev server.
    pub const VITE_APP: &str = r#"Here is a minimal Vite app.

<boltArtifact id="vite-app" title="Vite starter">
<boltAction type="file" filePath="package.json">
{
  "name": "vite-app",
  "scripts": { "dev": "vite" }
}
</boltAction>
<boltAction type="file" filePath="src/main.js">
document.querySelector('#app').innerHTML = '<h1>Hi</h1>';
</boltAction>
<boltAction type="shell">
npm install
</boltAction>
<boltAction type="shell">
npm run dev
</boltAction>
</boltArtifact>"#;

    /// Actions the runner cannot use, between two valid ones.
    pub const WITH_INVALID: &str = r#"<boltArtifact id="broken" title="Broken actions">
<boltAction type="file" filePath="ok.txt">ok</boltAction>
<boltAction type="deploy">vercel</boltAction>
<boltAction type="file">no path</boltAction>
<boltAction type="shell">   </boltAction>
<boltAction type="shell">echo done</boltAction>
</boltArtifact>"#;

    /// Two artifacts in one message.
    pub const TWO_ARTIFACTS: &str = r#"First the config.
<boltArtifact id="config" title="Config"><boltAction type="file" filePath=".env">PORT=3000</boltAction></boltArtifact>
Then the server.
<boltArtifact id="server" title="Server"><boltAction type="shell">node server.js</boltAction></boltArtifact>"#;

    /// HTML-looking text that is not markup.
    pub const LOOKALIKES: &str = "Use <strong>bold</strong>, a <br/> or <boltArtifacts> in \
        prose; none of them are artifacts.";
}
