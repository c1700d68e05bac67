//! Incremental tag scanning over a growing buffer.
//!
//! The scanner never consumes input it cannot classify yet. A buffer that
//! ends in the middle of a tag literal (`"<boltAr"`) is reported as
//! [`OpenTag::Incomplete`] so the caller holds the bytes back until the next
//! chunk arrives. Anything that diverges from the literal is ordinary text and
//! can be emitted immediately.
//!
//! All literals are ASCII, so every offset returned here is a char boundary
//! of the input.

pub const ARTIFACT_OPEN: &str = "<boltArtifact";
pub const ARTIFACT_CLOSE: &str = "</boltArtifact>";
pub const ACTION_OPEN: &str = "<boltAction";
pub const ACTION_CLOSE: &str = "</boltAction>";

/// Outcome of scanning for an open tag at a given offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenTag {
    /// Not this tag. `input[start..end]` is ordinary text; `end > start`.
    Text { end: usize },
    /// Still a candidate; more input is needed.
    Incomplete,
    /// The whole tag is present. `end` is the offset just past its `>`.
    Complete { end: usize },
}

/// Classify the open tag `literal` starting at `start`.
///
/// The literal must be followed by whitespace or `>`; `<boltActionX` is text.
pub fn scan_open_tag(input: &str, start: usize, literal: &str) -> OpenTag {
    let bytes = input.as_bytes();
    let expected = literal.as_bytes();

    for (i, &b) in expected.iter().enumerate() {
        match bytes.get(start + i) {
            None => return OpenTag::Incomplete,
            Some(&actual) if actual != b => {
                return OpenTag::Text {
                    end: (start + i).max(start + 1),
                }
            }
            Some(_) => {}
        }
    }

    let after = start + expected.len();
    match bytes.get(after) {
        None => OpenTag::Incomplete,
        Some(&c) if c == b'>' || c.is_ascii_whitespace() => match input[after..].find('>') {
            Some(offset) => OpenTag::Complete {
                end: after + offset + 1,
            },
            None => OpenTag::Incomplete,
        },
        Some(_) => OpenTag::Text { end: after },
    }
}

/// Find the next occurrence of the open tag `literal` at or after `from`.
///
/// Occurrences followed by a character that cannot continue the tag are
/// skipped. An occurrence at the very end of the buffer counts as a
/// candidate.
pub fn find_open_tag(input: &str, from: usize, literal: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(offset) = input[cursor..].find(literal) {
        let start = cursor + offset;
        let after = start + literal.len();
        match input.as_bytes().get(after) {
            None => return Some(start),
            Some(&c) if c == b'>' || c.is_ascii_whitespace() => return Some(start),
            Some(_) => cursor = after,
        }
    }
    None
}

/// Length of the longest suffix of `text` that is a proper prefix of
/// `literal`. Those bytes may still turn into `literal` and must be held.
pub fn partial_suffix_len(text: &str, literal: &str) -> usize {
    let max = literal.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| text.as_bytes().ends_with(&literal.as_bytes()[..n]))
        .unwrap_or(0)
}

/// Extract `name="value"` from a tag. First match wins; no escaping.
pub fn extract_attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let mut cursor = 0;
    while let Some(offset) = tag[cursor..].find(&needle) {
        let value_start = cursor + offset + needle.len();
        match tag[value_start..].find('"') {
            Some(len) => return Some(&tag[value_start..value_start + len]),
            None => cursor = value_start,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_tag() {
        let input = r#"x<boltArtifact id="a" title="T">rest"#;
        assert_eq!(
            scan_open_tag(input, 1, ARTIFACT_OPEN),
            OpenTag::Complete { end: 32 }
        );
        assert_eq!(&input[32..], "rest");
    }

    #[test]
    fn test_prefix_held_back() {
        for cut in 1..=ARTIFACT_OPEN.len() {
            let input = &ARTIFACT_OPEN[..cut];
            assert_eq!(
                scan_open_tag(input, 0, ARTIFACT_OPEN),
                OpenTag::Incomplete,
                "prefix {input:?}"
            );
        }
        assert_eq!(
            scan_open_tag(r#"<boltArtifact id="a""#, 0, ARTIFACT_OPEN),
            OpenTag::Incomplete
        );
    }

    #[test]
    fn test_divergence_is_text() {
        assert_eq!(
            scan_open_tag("<strong>", 0, ARTIFACT_OPEN),
            OpenTag::Text { end: 1 }
        );
        assert_eq!(
            scan_open_tag("<br/>", 0, ARTIFACT_OPEN),
            OpenTag::Text { end: 2 }
        );
        assert_eq!(scan_open_tag("</p>", 0, ARTIFACT_OPEN), OpenTag::Text { end: 1 });
        assert_eq!(scan_open_tag("<", 0, ARTIFACT_OPEN), OpenTag::Incomplete);
        assert_eq!(
            scan_open_tag("<boltArtifacts>", 0, ARTIFACT_OPEN),
            OpenTag::Text { end: 13 }
        );
    }

    #[test]
    fn test_divergence_before_multibyte() {
        let input = "<bé";
        assert_eq!(scan_open_tag(input, 0, ARTIFACT_OPEN), OpenTag::Text { end: 2 });
        assert!(input.is_char_boundary(2));
    }

    #[test]
    fn test_find_open_tag_skips_longer_names() {
        let input = r#"<boltActions><boltAction type="shell">"#;
        assert_eq!(find_open_tag(input, 0, ACTION_OPEN), Some(13));
        assert_eq!(find_open_tag("<boltAction", 0, ACTION_OPEN), Some(0));
        assert_eq!(find_open_tag("nothing", 0, ACTION_OPEN), None);
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len("npm i</bolt", ACTION_CLOSE), 6);
        assert_eq!(partial_suffix_len("npm i<", ACTION_CLOSE), 1);
        assert_eq!(partial_suffix_len("npm i", ACTION_CLOSE), 0);
        assert_eq!(partial_suffix_len("a < b", ACTION_CLOSE), 0);
        assert_eq!(partial_suffix_len("", ACTION_CLOSE), 0);
    }

    #[test]
    fn test_extract_attribute() {
        let tag = r#"<boltAction type="file" filePath="src/index.js">"#;
        assert_eq!(extract_attribute(tag, "type"), Some("file"));
        assert_eq!(extract_attribute(tag, "filePath"), Some("src/index.js"));
        assert_eq!(extract_attribute(tag, "title"), None);

        let tag = r#"<boltArtifact id="first" id="second" title="">"#;
        assert_eq!(extract_attribute(tag, "id"), Some("first"));
        assert_eq!(extract_attribute(tag, "title"), Some(""));
    }
}
