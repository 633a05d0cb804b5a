//! Compact output rendering helpers for CLI surfaces and gate reasons.
//!
//! Keeps reasons bounded and readable while preserving signal.

use colored::Colorize;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render up to `max_items` messages with compact formatting.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    if messages.len() > max_items {
        format!("{} (+{} more)", shown, messages.len() - max_items)
    } else {
        shown
    }
}

/// Longest reason shown on one terminal line. JSON output keeps the full text.
pub const REASON_DISPLAY_CHARS: usize = 240;

/// Gate reason bounded for terminal display.
pub fn reason_line(reason: &str) -> String {
    compact_line(reason, REASON_DISPLAY_CHARS)
}

/// `PASS` / `FAIL` / `SKIP` / `WARN` status word for terminal output.
pub fn status_word(passed: bool, blocking: bool) -> String {
    match (passed, blocking) {
        (true, _) => "PASS".green().bold().to_string(),
        (false, true) => "FAIL".red().bold().to_string(),
        (false, false) => "WARN".yellow().bold().to_string(),
    }
}

pub fn skip_word() -> String {
    "SKIP".bright_black().bold().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_line_bounds_length() {
        assert_eq!(compact_line("a  b\n c", 10), "a b c");
        assert_eq!(compact_line("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn preview_messages_counts_hidden_items() {
        let msgs = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        assert_eq!(preview_messages(&msgs, 2, 20), "one | two (+1 more)");
        assert_eq!(preview_messages(&[], 2, 20), "");
    }

    #[test]
    fn reason_line_bounds_long_reasons_only() {
        let short = "missing from actual: a.json";
        assert_eq!(reason_line(short), short);
        let long = vec!["A-000"; 100].join(", ");
        let shown = reason_line(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), REASON_DISPLAY_CHARS + 3);
    }

    #[test]
    fn status_word_contains_plain_label() {
        assert!(status_word(true, true).contains("PASS"));
        assert!(status_word(false, true).contains("FAIL"));
        assert!(status_word(false, false).contains("WARN"));
        assert!(skip_word().contains("SKIP"));
    }
}
