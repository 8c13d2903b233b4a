//! Helpers for log previews and Markdown sanitisation.

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-9;]*[a-zA-Z]").expect("ANSI escape pattern is valid"));

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, on a character boundary, with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Remove terminal colour/cursor escape sequences.
pub fn strip_ansi(input: &str) -> String {
    ANSI_ESCAPE.replace_all(input, "").into_owned()
}

/// Make rendered Markdown safe to store: valid UTF-8, no ANSI escapes.
///
/// Cleaning-service output occasionally carries escape codes from the model
/// host's terminal; they would show up as garbage in the published files.
pub fn sanitize_markdown(bytes: &[u8]) -> Vec<u8> {
    strip_ansi(&String::from_utf8_lossy(bytes)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // Each Hangul syllable is three bytes in UTF-8.
        let s = "가나다라";
        let result = truncate_for_log(s, 4);
        assert_eq!(result, "가…(+9 bytes)");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1B[1;32mgreen\x1B[0m text"), "green text");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_sanitize_markdown_replaces_invalid_utf8() {
        let bytes = [b'#', b' ', 0xFF, b'x', 0x1B, b'[', b'0', b'm'];
        let clean = sanitize_markdown(&bytes);
        assert_eq!(String::from_utf8(clean).unwrap(), "# \u{FFFD}x");
    }
}
