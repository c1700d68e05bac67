//! Assertion helpers with readable failure output.

use boltbench_protocol::ActionStatus;
use std::path::Path;

/// Assert that two strings are equal, with a line diff on failure.
///
/// ```rust
/// use boltbench_test_utils::assertions::assert_text_eq;
///
/// assert_text_eq("Before After", "Before After");
/// ```
pub fn assert_text_eq(actual: &str, expected: &str) {
    if actual != expected {
        let diff = similar::TextDiff::from_lines(expected, actual);
        let mut output = String::new();

        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => "-",
                similar::ChangeTag::Insert => "+",
                similar::ChangeTag::Equal => " ",
            };
            output.push_str(&format!("{}{}", sign, change));
        }

        panic!(
            "Text differs.\nExpected: {:?}\nActual:   {:?}\nDiff:\n{}",
            expected, actual, output
        );
    }
}

/// Assert that a file on disk has exactly `expected` as content.
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert_text_eq(&content, expected);
}

/// Assert that a sequence of observed statuses is a legal lifecycle:
/// `pending`, then optionally `running`, then at most one terminal status,
/// with nothing after it.
pub fn assert_status_lifecycle(history: &[ActionStatus]) {
    let mut previous: Option<ActionStatus> = None;
    for (index, status) in history.iter().copied().enumerate() {
        let legal = match (previous, status) {
            (None, _) => true,
            (Some(prev), _) if prev.is_terminal() => false,
            (Some(ActionStatus::Pending), ActionStatus::Pending) => false,
            (Some(ActionStatus::Running), ActionStatus::Pending | ActionStatus::Running) => false,
            _ => true,
        };
        assert!(
            legal,
            "Illegal status transition at index {}: {:?} -> {:?} in {:?}",
            index, previous, status, history
        );
        previous = Some(status);
    }
}

/// Assert that a string contains a substring (with better error messages).
#[macro_export]
macro_rules! assert_str_contains {
    ($haystack:expr, $needle:expr) => {
        if !$haystack.contains($needle) {
            panic!(
                "String does not contain expected substring.\nExpected to find: {}\nIn string:\n{}",
                $needle, $haystack
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionStatus::*;

    #[test]
    fn test_assert_text_eq() {
        assert_text_eq("a\nb", "a\nb");
    }

    #[test]
    #[should_panic(expected = "Text differs")]
    fn test_assert_text_eq_reports_diff() {
        assert_text_eq("a\nc", "a\nb");
    }

    #[test]
    fn test_legal_lifecycles() {
        assert_status_lifecycle(&[Pending, Running, Complete]);
        assert_status_lifecycle(&[Pending, Aborted]);
        assert_status_lifecycle(&[Running, Failed]);
    }

    #[test]
    #[should_panic(expected = "Illegal status transition")]
    fn test_nothing_after_terminal() {
        assert_status_lifecycle(&[Pending, Running, Complete, Running]);
    }

    #[test]
    fn test_str_contains_macro() {
        assert_str_contains!("Action failed", "failed");
    }
}
