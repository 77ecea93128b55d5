//! Shared utility helpers.

/// Truncate `s` to at most `max` characters (Unicode scalar values).
///
/// Unlike a byte cut this never splits a code point, and the result is
/// exactly `max` characters whenever the input was longer.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string to `max` chars, appending `…` if trimmed.
///
/// Used for log fields, never for payloads the model parses.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", truncate_chars(s, max))
    }
}

/// Resolve a `$VAR` reference from the environment; other values pass
/// through unchanged. An unset variable resolves to the empty string.
pub fn resolve_env_ref(value: &str) -> String {
    match value.strip_prefix('$') {
        Some(var) => std::env::var(var).unwrap_or_default(),
        None => value.to_string(),
    }
}
