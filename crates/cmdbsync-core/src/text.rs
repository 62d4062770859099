//! String helpers shared by the clients and the mapping engine.

/// Non-breaking space as emitted by the source system.
pub const NBSP: char = '\u{a0}';

/// Marker appended to truncated values.
pub const ELLIPSIS: &str = "...";

/// Replace non-breaking spaces with regular spaces.
#[must_use]
pub fn normalize_spaces(value: &str) -> String {
    value.replace(NBSP, " ")
}

/// Cache key for a name: NBSP-normalized and lowercased.
#[must_use]
pub fn normalize_name(value: &str) -> String {
    normalize_spaces(value).to_lowercase()
}

/// Whether two names refer to the same object.
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// Truncate to `max_len` characters, ending in [`ELLIPSIS`] when shortened.
///
/// Values within bounds are returned unchanged.
#[must_use]
pub fn truncate_with_ellipsis(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str(&ELLIPSIS[..max_len.min(ELLIPSIS.len())]);
    truncated
}

/// Replace characters the target rejects: angle brackets become square
/// brackets, non-breaking spaces become spaces, and the result is trimmed.
#[must_use]
pub fn sanitize(value: &str) -> String {
    normalize_spaces(value)
        .replace('<', "[")
        .replace('>', "]")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Server\u{a0}A"), "server a");
        assert!(names_match("Server\u{a0}A", "server a"));
        assert!(!names_match("server a", "server b"));
    }

    #[test]
    fn test_truncate_exact_length() {
        let out = truncate_with_ellipsis("abcdefghij", 8);
        assert_eq!(out, "abcde...");
        assert_eq!(out.chars().count(), 8);
    }

    #[test]
    fn test_truncate_within_bounds() {
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
        assert_eq!(truncate_with_ellipsis("", 3), "");
    }

    #[test]
    fn test_truncate_multibyte() {
        let out = truncate_with_ellipsis("ñandú-ñandú-ñandú", 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncate_tiny_bound() {
        assert_eq!(truncate_with_ellipsis("abcdef", 2), "..");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  <rack\u{a0}1>  "), "[rack 1]");
    }
}
