//! Identifier helpers.
//!
//! Action identifiers are derived from their message id and position
//! (`msg_1:3`) so that re-parsing a message reproduces the same ids.

/// Separator between a message id and the action index.
const ACTION_SEPARATOR: char = ':';

/// Identifier building and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Build the id of the `index`-th action of a message.
    pub fn action(message_id: &str, index: usize) -> String {
        format!("{message_id}{ACTION_SEPARATOR}{index}")
    }

    /// Split an action id back into its message id and index.
    pub fn parse_action(action_id: &str) -> Option<(&str, usize)> {
        let (message_id, index) = action_id.rsplit_once(ACTION_SEPARATOR)?;
        if message_id.is_empty() {
            return None;
        }
        Some((message_id, index.parse().ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ids_are_deterministic() {
        assert_eq!(Identifier::action("msg_a", 0), "msg_a:0");
        assert_eq!(Identifier::action("msg_a", 12), Identifier::action("msg_a", 12));
    }

    #[test]
    fn test_parse_action_id() {
        assert_eq!(Identifier::parse_action("msg_a:3"), Some(("msg_a", 3)));
        // Message ids may themselves contain the separator
        assert_eq!(Identifier::parse_action("a:b:7"), Some(("a:b", 7)));
        assert_eq!(Identifier::parse_action(":1"), None);
        assert_eq!(Identifier::parse_action("msg_a"), None);
        assert_eq!(Identifier::parse_action("msg_a:x"), None);
    }
}
