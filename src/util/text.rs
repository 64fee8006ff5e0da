//! Small text helpers.

/// Truncate a string to at most `max_chars` characters total, with an
/// ellipsis as the final character when anything was cut.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}
