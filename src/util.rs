//! Internal utilities.

use crate::path::PathExpr;
use std::borrow::Cow;

/// Characters that force a recipient to be written double-quoted. A comma
/// would otherwise split the recipient in two.
const NEEDS_QUOTES: [char; 8] = ['|', '&', ';', '(', ')', '<', '>', ','];

/// Wraps `value` in double quotes when it contains whitespace, a comma or a
/// shell metacharacter and is not quoted already.
#[must_use]
pub fn quote(value: &str) -> Cow<'_, str> {
    let special = value
        .chars()
        .any(|c| c.is_whitespace() || NEEDS_QUOTES.contains(&c));
    if special && !is_quoted(value) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Borrowed(value)
    }
}

/// Strips one pair of matching surrounding quotes.
#[must_use]
pub fn unquote(value: &str) -> &str {
    if is_quoted(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
}

/// Next free entry label: one past the highest numeric label, or 1.
#[must_use]
pub fn next_seq(entries: &[PathExpr]) -> usize {
    entries
        .iter()
        .filter_map(|p| p.last_label()?.parse::<usize>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_pipes_and_spaces() {
        assert_eq!(
            quote("| /var/lib/mailman/mail/mailman leave users"),
            "\"| /var/lib/mailman/mail/mailman leave users\""
        );
        assert_eq!(quote("two words"), "\"two words\"");
        assert_eq!(quote("a,b"), "\"a,b\"");
    }

    #[test]
    fn leaves_plain_recipients_alone() {
        assert!(matches!(quote("postmaster"), Cow::Borrowed("postmaster")));
        assert_eq!(quote("user@example.com"), "user@example.com");
        assert_eq!(quote("\"| already quoted\""), "\"| already quoted\"");
    }

    #[test]
    fn unquote_strips_matching_pair() {
        assert_eq!(unquote("\"| cmd\""), "| cmd");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"mismatch'"), "\"mismatch'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn next_seq_skips_comments() {
        let root = PathExpr::root();
        let paths = [
            root.child("#comment").nth(1),
            root.child("1"),
            root.child("#empty"),
            root.child("4"),
        ];
        assert_eq!(next_seq(&paths), 5);
        assert_eq!(next_seq(&[root.child("#comment")]), 1);
        assert_eq!(next_seq(&[]), 1);
    }
}
