//! Helpers for feeding text to the streaming parser the way a model would.
//!
//! The parser receives the accumulated message on every call, so these
//! helpers build the growing prefixes from a chosen chunking.

/// Byte offsets of every char boundary strictly inside `text`.
pub fn split_points(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).filter(|&i| i > 0).collect()
}

/// Growing prefixes ending at `points` and then at the full text.
pub fn prefixes_at<'a>(text: &'a str, points: &[usize]) -> Vec<&'a str> {
    let mut out: Vec<&str> = points.iter().map(|&p| &text[..p]).collect();
    out.push(text);
    out
}

/// One prefix per character.
pub fn char_prefixes(text: &str) -> Vec<&str> {
    prefixes_at(text, &split_points(text))
}

/// Prefixes that grow by `size` chars at a time.
pub fn sized_prefixes(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let points: Vec<usize> = split_points(text)
        .into_iter()
        .enumerate()
        .filter(|(n, _)| (n + 1) % size == 0)
        .map(|(_, p)| p)
        .collect();
    prefixes_at(text, &points)
}

/// Split into chunks of at most `size` chars.
pub fn chunks_of(text: &str, size: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for end in sized_prefixes(text, size).into_iter().map(str::len) {
        if end > start {
            out.push(&text[start..end]);
            start = end;
        }
    }
    out
}
