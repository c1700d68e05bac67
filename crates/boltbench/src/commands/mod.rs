//! Command handlers for the boltbench CLI.

pub mod logging;
pub mod parse;
pub mod replay;

pub use logging::*;
pub use parse::*;
pub use replay::*;

use anyhow::Context;
use std::io::Read;
use std::path::Path;

/// Read a transcript file, or stdin for `-`.
pub fn read_transcript(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read transcript from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))
}

/// Growing prefixes of `text`, `size` chars apart, ending with the full text.
pub fn stream_prefixes(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut prefixes: Vec<&str> = text
        .char_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .enumerate()
        .filter(|(n, _)| (n + 1) % size == 0)
        .map(|(_, i)| &text[..i])
        .collect();
    prefixes.push(text);
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_prefixes() {
        assert_eq!(stream_prefixes("abcde", 2), vec!["ab", "abcd", "abcde"]);
        assert_eq!(stream_prefixes("añb", 1), vec!["a", "añ", "añb"]);
        assert_eq!(stream_prefixes("", 4), vec![""]);
    }
}
