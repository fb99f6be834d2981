//! Lexical look-ahead for string literals.
//!
//! The incremental compiler must tell "the user pressed enter twice" apart
//! from "the user is in the middle of a multi-line string". This scanner
//! finds the last string literal in a source and reports whether it was
//! terminated.
//!
//! Recognized literals: `'…'`, `"…"`, `'''…'''` and `"""…"""`, optionally
//! preceded by up to two prefix letters from `r`, `b`, `f`, `u` (any case).
//! Backslash escapes the next character except in raw (`r`) strings. A `#`
//! at the start of a word, outside a string, starts a comment running to
//! the end of the line; elsewhere it is an ordinary character.

use regex::bytes::Regex;
use std::sync::OnceLock;

/// Span of a string literal within a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSpan {
    /// Byte offset where the literal (including its prefix) starts.
    pub start: usize,
    /// Byte offset just past the closing quote; `None` if unterminated.
    pub end: Option<usize>,
    /// The opening token: prefix letters followed by the quote.
    pub quote: String,
}

impl StringSpan {
    /// Returns `true` if the literal never closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Bytes before a quote inspected for a prefix: two letters plus the
/// widest UTF-8 character before them.
const PREFIX_WINDOW: usize = 6;

#[allow(clippy::expect_used)]
fn prefix_regex() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"(?:^|[^\w])([rRbBfFuU]{1,2})$").expect("valid regex"))
}

/// Finds the last string literal in `source`.
///
/// Returns `None` if the source contains no string literal.
///
/// # Examples
///
/// ```
/// use incsh::compiler::lexer::find_partial_string;
///
/// let span = find_partial_string("echo 'done' \"open\n").unwrap();
/// assert_eq!(span.start, 12);
/// assert_eq!(span.end, None);
/// assert_eq!(span.quote, "\"");
/// ```
#[must_use]
pub fn find_partial_string(source: &str) -> Option<StringSpan> {
    let bytes = source.as_bytes();
    let mut last = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' if i == 0 || matches!(bytes[i - 1], b' ' | b'\t' | b'\n') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
            }
            q @ (b'\'' | b'"') => {
                let prefix = prefix_regex()
                    .captures(&bytes[i.saturating_sub(PREFIX_WINDOW)..i])
                    .and_then(|c| c.get(1))
                    .map_or(&[][..], |m| m.as_bytes());
                let start = i - prefix.len();
                let raw = prefix.iter().any(|b| matches!(b, b'r' | b'R'));
                let triple = bytes[i..].starts_with(&[q, q, q]);
                let quote_len = if triple { 3 } else { 1 };
                let body_start = i + quote_len;

                let end = find_close(bytes, body_start, q, triple, raw);
                last = Some(StringSpan {
                    start,
                    end,
                    quote: source[start..body_start].to_string(),
                });
                match end {
                    Some(end) => i = end,
                    None => return last,
                }
            }
            _ => i += 1,
        }
    }
    last
}

/// Returns `true` if `source` ends inside an unterminated string literal.
#[must_use]
pub fn in_partial_string(source: &str) -> bool {
    find_partial_string(source).is_some_and(|span| span.is_open())
}

fn find_close(bytes: &[u8], mut i: usize, q: u8, triple: bool, raw: bool) -> Option<usize> {
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && !raw {
            i += 2;
            continue;
        }
        if b == q {
            if !triple {
                return Some(i + 1);
            }
            if bytes[i..].starts_with(&[q, q, q]) {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("echo hi\n", None ; "no strings")]
    #[test_case("echo 'hi'\n", Some((5, Some(9), "'")) ; "closed single")]
    #[test_case("echo \"hi\n", Some((5, None, "\"")) ; "open double")]
    #[test_case("x = '''a\nb'''\n", Some((4, Some(13), "'''")) ; "closed triple")]
    #[test_case("x = \"\"\"a\n\n", Some((4, None, "\"\"\"")) ; "open triple")]
    #[test_case("echo r'c:\\'\n", Some((5, Some(11), "r'")) ; "raw ignores escape")]
    #[test_case("echo 'it\\'s\n", Some((5, None, "'")) ; "escaped quote stays open")]
    #[test_case("echo Rb\"x\"\n", Some((5, Some(10), "Rb\"")) ; "two letter prefix")]
    #[test_case("echo bar'x'\n", Some((8, Some(11), "'")) ; "word before quote is no prefix")]
    #[test_case("echo ok # don't\n", None ; "quote inside comment")]
    #[test_case("echo a#b 'x\n\n", Some((9, None, "'")) ; "hash inside word is not comment")]
    #[test_case("echo \u{e9}rb'x'\n", Some((9, Some(12), "'")) ; "letters after word char")]
    #[test_case("echo \u{2014}rb'x'\n", Some((8, Some(13), "rb'")) ; "prefix after multibyte punctuation")]
    #[test_case("echo 'a' \"b\"\n", Some((9, Some(12), "\"")) ; "reports last literal")]
    fn test_find_partial_string(source: &str, expected: Option<(usize, Option<usize>, &str)>) {
        let found = find_partial_string(source).map(|s| (s.start, s.end, s.quote));
        let expected = expected.map(|(s, e, q)| (s, e, q.to_string()));
        assert_eq!(found, expected);
    }

    #[test]
    fn test_in_partial_string() {
        assert!(in_partial_string("echo 'abc\n\n"));
        assert!(!in_partial_string("echo 'abc'\n\n"));
        assert!(!in_partial_string("\n"));
    }

    #[test]
    fn test_hash_inside_string_is_not_comment() {
        let span = find_partial_string("echo '#x\n").unwrap();
        assert!(span.is_open());
    }

    proptest! {
        #[test]
        fn quote_free_text_has_no_strings(text in "[a-z0-9 \n:$.]{0,80}") {
            prop_assert!(find_partial_string(&text).is_none());
        }

        #[test]
        fn closed_literal_is_found(body in "[a-z0-9 ]{0,40}") {
            let source = format!("echo \"{body}\" tail\n");
            let span = find_partial_string(&source).unwrap();
            prop_assert_eq!(span.start, 5);
            prop_assert_eq!(span.end, Some(7 + body.len()));
        }

        #[test]
        fn unclosed_literal_is_open(body in "[a-z0-9 \n]{0,40}") {
            let source = format!("echo '{body}");
            prop_assert!(in_partial_string(&source));
        }
    }
}
