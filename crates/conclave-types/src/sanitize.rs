//! Query sanitization.

/// Strips null bytes and C0/C1 control characters from a query.
///
/// TAB, LF, and CR are preserved; everything else in U+0000..U+001F,
/// U+007F, and U+0080..U+009F is removed. All other characters pass
/// through unchanged, so two queries differing only in stripped
/// characters sanitize to the same string.
pub fn sanitize_query(raw: &str) -> String {
    raw.chars().filter(|&c| !is_stripped_control(c)).collect()
}

fn is_stripped_control(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => false,
        '\u{0000}'..='\u{001F}' | '\u{007F}' | '\u{0080}'..='\u{009F}' => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_null_bytes() {
        assert_eq!(sanitize_query("he\0llo"), "hello");
    }

    #[test]
    fn test_preserves_tab_lf_cr() {
        assert_eq!(sanitize_query("a\tb\nc\rd"), "a\tb\nc\rd");
    }

    #[test]
    fn test_strips_c0_controls() {
        assert_eq!(sanitize_query("a\u{0001}b\u{001B}c"), "abc");
    }

    #[test]
    fn test_strips_c1_controls_and_del() {
        assert_eq!(sanitize_query("a\u{007F}b\u{0085}c\u{009F}d"), "abcd");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "What is the capital of France? Résumé 日本語";
        assert_eq!(sanitize_query(text), text);
    }

    #[test]
    fn test_all_control_becomes_empty() {
        assert_eq!(sanitize_query("\0\u{0002}\u{009B}"), "");
    }
}
