//! Token estimation utilities.
//!
//! Uses a character-based heuristic: 4 characters per token, rounded down.
//! Lengths are counted in characters, never bytes, so every cut lands on
//! a character boundary.

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Length of `text` in characters.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    char_count(text) / CHARS_PER_TOKEN
}

/// Truncate `text` to at most `max_tokens * 4` characters.
///
/// When the cut falls mid-line and a line break sits in the last fifth of
/// the allowance, the partial trailing line is dropped instead.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    truncate_to_chars(text, max_tokens.saturating_mul(CHARS_PER_TOKEN))
}

/// Character-level form of [`truncate_to_tokens`].
pub fn truncate_to_chars(text: &str, max_chars: usize) -> &str {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let prefix = &text[..cut];

    if let Some(newline) = prefix.rfind('\n') {
        let position = char_count(&prefix[..newline]);
        // position >= 0.8 * max_chars, in integers
        if position.saturating_mul(5) >= max_chars.saturating_mul(4) {
            return &prefix[..newline];
        }
    }

    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_strings_round_down() {
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 1);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 8 characters, 16 bytes
        let text = "éééééééé";
        assert_eq!(estimate_tokens(text), 2);
        assert_eq!(truncate_to_tokens(text, 1), "éééé");
    }

    #[test]
    fn fitting_text_unchanged() {
        let text = "a".repeat(40);
        assert_eq!(truncate_to_tokens(&text, 10), text);
        assert_eq!(truncate_to_tokens("", 0), "");
    }

    #[test]
    fn hard_cut_without_late_newline() {
        let text = format!("ab\n{}", "c".repeat(100));
        let out = truncate_to_tokens(&text, 10);
        assert_eq!(char_count(out), 40);
        assert!(out.starts_with("ab\n"));
    }

    #[test]
    fn cuts_at_late_newline() {
        // newline at position 35 of a 40-char allowance (>= 32)
        let text = format!("{}\n{}", "a".repeat(35), "b".repeat(100));
        let out = truncate_to_tokens(&text, 10);
        assert_eq!(out, "a".repeat(35));
    }

    #[test]
    fn newline_exactly_at_eighty_percent() {
        let text = format!("{}\n{}", "a".repeat(32), "b".repeat(100));
        assert_eq!(truncate_to_tokens(&text, 10), "a".repeat(32));

        let text = format!("{}\n{}", "a".repeat(31), "b".repeat(100));
        assert_eq!(char_count(truncate_to_tokens(&text, 10)), 40);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert_eq!(truncate_to_tokens("hello", 0), "");
    }

    #[test]
    fn output_never_exceeds_allowance() {
        let samples = [
            "plain text without breaks".repeat(7),
            "line one\nline two\nline three\n".repeat(9),
            "ünïcödé\n".repeat(20),
        ];
        for s in &samples {
            for n in 0..30 {
                let out = truncate_to_tokens(s, n);
                assert!(char_count(out) <= n * CHARS_PER_TOKEN);
                assert!(s.starts_with(out));
                if char_count(s) <= n * CHARS_PER_TOKEN {
                    assert_eq!(out, s.as_str());
                }
            }
        }
    }
}
