//! Header text cleanup.
//!
//! Spreadsheet authors annotate headers with parenthesised comments, e.g.
//! `Effort (man days)`. Intervals and acronyms work on the bare name.

use regex::Regex;
use std::sync::OnceLock;

/// Strip a trailing `(...)` comment and surrounding whitespace from a header.
pub fn clean_header(raw: &str) -> String {
    trailing_comment_re().replace(raw, "").trim().to_string()
}

/// Remove every `(...)` aside from `text`, wherever it appears.
pub fn strip_parentheticals(text: &str) -> String {
    parenthetical_re().replace_all(text, " ").to_string()
}

fn trailing_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("header comment regex must compile"))
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^()]*\)").expect("parenthetical regex must compile"))
}
