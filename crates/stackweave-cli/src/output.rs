//! Formatted output helpers for CLI commands.
//!
//! Provides consistent change markers, value rendering, and rules.

use serde_json::Value;
use stackweave_runtime::provider::Change;

/// Returns the one-character marker shown before a realized resource.
#[must_use]
pub const fn change_marker(change: Change) -> char {
    match change {
        Change::Created => '+',
        Change::Updated => '~',
        Change::Unchanged => '=',
    }
}

/// Renders an output value without JSON quoting for plain strings.
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns a horizontal rule of the given width.
#[must_use]
pub fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_distinct() {
        assert_eq!(change_marker(Change::Created), '+');
        assert_eq!(change_marker(Change::Updated), '~');
        assert_eq!(change_marker(Change::Unchanged), '=');
    }

    #[test]
    fn strings_render_unquoted() {
        assert_eq!(format_value(&Value::String("a/b".into())), "a/b");
        assert_eq!(format_value(&serde_json::json!(["x", 1])), r#"["x",1]"#);
    }

    #[test]
    fn rule_has_requested_width() {
        assert_eq!(rule(3).chars().count(), 3);
    }
}
