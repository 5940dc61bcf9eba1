//! Escape-aware cursor over a single line of source text.
//!
//! The [`Scanner`] is the lowest layer of the statement parser: a byte-offset
//! cursor that understands the escape grammar and reads one user-perceived
//! character at a time via [`Scanner::read_grapheme`]. Everything above it
//! (statement parsing, the pattern sub-grammar) is written in terms of these
//! primitives, so offset bookkeeping lives in exactly one place.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

/// Token and operator spellings of the statement grammar.
pub mod syntax {
    pub const ESCAPE: char = '\\';
    pub const COMBINATOR: char = ',';
    pub const JOINT: char = ':';
    pub const COMMENT: &str = "//";
    pub const ELLIPSIS: &str = "...";
    pub const LIST: &str = "...";
    pub const SPACE: char = ' ';
    pub const TAB: char = '\t';
    pub const PATTERN_DELIMITER: char = '/';
    pub const INFIX_START: &str = "<";
    pub const INFIX_END: &str = ">";
    pub const PATTERN_INFIX_START: &str = "<<";
    pub const PATTERN_INFIX_END: &str = ">>";
    pub const NOMINAL_INFIX_START: &str = "</";
    pub const NOMINAL_INFIX_END: &str = "/>";
    pub const SET_START: char = '[';
    pub const SET_END: char = ']';
    pub const SET_NEGATE: char = '^';
    pub const RANGE: char = '-';
    pub const GROUP_START: char = '(';
    pub const GROUP_END: char = ')';
    pub const ALTERNATOR: char = '|';
    pub const QUANTIFY_ZERO_PLUS: char = '*';
    pub const QUANTIFY_ONE_PLUS: char = '+';
    pub const QUANTIFY_OPEN: char = '{';
    pub const QUANTIFY_CLOSE: char = '}';
    pub const RESTRAINT: char = '?';
}

/// Unicode block names that may appear in a `\u{Name}` escape, mapped to the
/// script class understood by the compiled matcher.
pub static UNICODE_BLOCKS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("Arabic", "Arabic"),
        ("Armenian", "Armenian"),
        ("Bengali", "Bengali"),
        ("Cherokee", "Cherokee"),
        ("Cyrillic", "Cyrillic"),
        ("Devanagari", "Devanagari"),
        ("Ethiopic", "Ethiopic"),
        ("Georgian", "Georgian"),
        ("Greek", "Greek"),
        ("Han", "Han"),
        ("Hangul", "Hangul"),
        ("Hebrew", "Hebrew"),
        ("Hiragana", "Hiragana"),
        ("Katakana", "Katakana"),
        ("Khmer", "Khmer"),
        ("Latin", "Latin"),
        ("Mongolian", "Mongolian"),
        ("Myanmar", "Myanmar"),
        ("Tamil", "Tamil"),
        ("Thai", "Thai"),
        ("Tibetan", "Tibetan"),
    ])
});

/// One user-perceived character produced by [`Scanner::read_grapheme`].
///
/// A grapheme is either a literal cluster from the source text, a character
/// decoded from a `\u{hex}` escape, or a reference to a registered Unicode
/// block (`\u{Greek}`), in which case [`Grapheme::block`] is set and
/// [`Grapheme::literal`] holds the block name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Grapheme {
    pub literal: String,
    pub block: Option<&'static str>,
    pub escaped: bool,
}

impl Grapheme {
    fn literal_cluster(cluster: &str) -> Grapheme {
        Grapheme {
            literal: cluster.to_string(),
            block: None,
            escaped: false,
        }
    }

    fn escaped_char(ch: char) -> Grapheme {
        Grapheme {
            literal: ch.to_string(),
            block: None,
            escaped: true,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        !self.escaped
            && self.block.is_none()
            && self
                .literal
                .chars()
                .all(|c| c == syntax::SPACE || c == syntax::TAB)
    }

    /// A single unescaped occurrence of `ch`.
    pub fn is_unescaped(&self, ch: char) -> bool {
        !self.escaped && self.block.is_none() && self.literal.chars().eq([ch])
    }
}

/// Cursor over one statement's text. Offsets are byte positions into the
/// original line, which is what span boundaries are expressed in.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Scanner<'a> {
        Scanner { text, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        debug_assert!(position <= self.text.len());
        self.position = position.min(self.text.len());
    }

    pub fn more(&self) -> bool {
        self.position < self.text.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.position..]
    }

    pub fn peek(&self, token: &str) -> bool {
        self.rest().starts_with(token)
    }

    pub fn peek_char(&self, ch: char) -> bool {
        self.rest().starts_with(ch)
    }

    /// Advance over `token` iff it prefixes the remaining input.
    pub fn read(&mut self, token: &str) -> bool {
        if self.peek(token) {
            self.position += token.len();
            true
        } else {
            false
        }
    }

    pub fn read_char(&mut self, ch: char) -> bool {
        if self.peek_char(ch) {
            self.position += ch.len_utf8();
            true
        } else {
            false
        }
    }

    /// Read `token` only when it is the final content of the line.
    pub fn read_then_terminal(&mut self, token: &str) -> bool {
        if self.rest() == token {
            self.position = self.text.len();
            true
        } else {
            false
        }
    }

    /// Consume up to (not including) the first occurrence of any delimiter,
    /// or the rest of the line when none occurs. Returns the consumed slice.
    pub fn read_until(&mut self, delimiters: &[&str]) -> &'a str {
        let rest = self.rest();
        let stop = delimiters
            .iter()
            .filter_map(|d| rest.find(d))
            .min()
            .unwrap_or(rest.len());
        self.position += stop;
        &rest[..stop]
    }

    /// Consume a run of tabs and spaces, returning the consumed slice.
    pub fn read_whitespace(&mut self) -> &'a str {
        let rest = self.rest();
        let stop = rest
            .find(|c: char| c != syntax::SPACE && c != syntax::TAB)
            .unwrap_or(rest.len());
        self.position += stop;
        &rest[..stop]
    }

    /// Read one grapheme, applying the escape grammar.
    ///
    /// An escape character followed by a space, tab, combinator, ellipsis, or
    /// another escape character yields that character marked `escaped`. A
    /// `\u{…}` form decodes either a code point (1–5 lowercase hex digits) or
    /// a registered block name. A bare trailing escape character yields the
    /// literal backslash. Any other escaped character is passed through with
    /// the `escaped` mark so higher layers can classify it (regex signs rely
    /// on this).
    pub fn read_grapheme(&mut self) -> Option<Grapheme> {
        if !self.more() {
            return None;
        }
        if self.read_char(syntax::ESCAPE) {
            if !self.more() {
                return Some(Grapheme::literal_cluster("\\"));
            }
            if let Some(decoded) = self.try_read_unicode_escape() {
                return Some(decoded);
            }
            if self.read(syntax::ELLIPSIS) {
                return Some(Grapheme {
                    literal: syntax::ELLIPSIS.to_string(),
                    block: None,
                    escaped: true,
                });
            }
            let ch = self.rest().chars().next()?;
            self.position += ch.len_utf8();
            return Some(Grapheme::escaped_char(ch));
        }
        let cluster = self.rest().graphemes(true).next()?;
        self.position += cluster.len();
        Some(Grapheme::literal_cluster(cluster))
    }

    /// Attempt a `u{…}` read following an already-consumed escape character.
    /// Leaves the cursor untouched when the body is not well formed.
    fn try_read_unicode_escape(&mut self) -> Option<Grapheme> {
        let start = self.position;
        if !self.read("u{") {
            return None;
        }
        let body = self.read_until(&["}"]);
        if !self.read("}") {
            self.position = start;
            return None;
        }
        let hex = !body.is_empty()
            && body.len() <= 5
            && body
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if hex {
            if let Some(ch) = u32::from_str_radix(body, 16).ok().and_then(char::from_u32) {
                return Some(Grapheme::escaped_char(ch));
            }
        }
        if let Some((name, _class)) = UNICODE_BLOCKS.get_key_value(body) {
            return Some(Grapheme {
                literal: (*name).to_string(),
                block: Some(*name),
                escaped: true,
            });
        }
        self.position = start;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_read_until() {
        let mut s = Scanner::new("abc, def");
        assert!(s.more());
        assert!(s.peek("abc"));
        assert_eq!(s.read_until(&[","]), "abc");
        assert!(s.read(", "));
        assert_eq!(s.read_until(&[","]), "def");
        assert!(!s.more());
    }

    #[test]
    fn test_read_whitespace() {
        let mut s = Scanner::new("\t  x");
        assert_eq!(s.read_whitespace(), "\t  ");
        assert_eq!(s.position(), 3);
        assert_eq!(s.read_whitespace(), "");
    }

    #[test]
    fn test_read_then_terminal() {
        let mut s = Scanner::new("ab");
        assert!(!s.read_then_terminal("a"));
        assert_eq!(s.position(), 0);
        assert!(s.read("a"));
        assert!(s.read_then_terminal("b"));
        assert!(!s.more());
    }

    #[test]
    fn test_plain_graphemes() {
        let mut s = Scanner::new("ab");
        let a = s.read_grapheme().unwrap();
        assert_eq!(a.literal, "a");
        assert!(!a.escaped);
        assert_eq!(s.read_grapheme().unwrap().literal, "b");
        assert!(s.read_grapheme().is_none());
    }

    #[test]
    fn test_combining_mark_is_one_grapheme() {
        // e + combining acute accent
        let mut s = Scanner::new("e\u{0301}x");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.literal, "e\u{0301}");
        assert_eq!(s.read_grapheme().unwrap().literal, "x");
    }

    #[test]
    fn test_escaped_characters() {
        let mut s = Scanner::new("\\,\\ \\\\");
        let comma = s.read_grapheme().unwrap();
        assert_eq!(comma.literal, ",");
        assert!(comma.escaped);
        let space = s.read_grapheme().unwrap();
        assert_eq!(space.literal, " ");
        assert!(space.escaped);
        let backslash = s.read_grapheme().unwrap();
        assert_eq!(backslash.literal, "\\");
        assert!(backslash.escaped);
    }

    #[test]
    fn test_trailing_escape_is_literal_backslash() {
        let mut s = Scanner::new("\\");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.literal, "\\");
        assert!(!g.escaped);
        assert!(!s.more());
    }

    #[test]
    fn test_unicode_codepoint_escape() {
        let mut s = Scanner::new("\\u{1f600}");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.literal, "\u{1f600}");
        assert!(g.escaped);
        assert!(g.block.is_none());
    }

    #[test]
    fn test_unicode_block_escape() {
        let mut s = Scanner::new("\\u{Greek}");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.block, Some("Greek"));
        assert_eq!(g.literal, "Greek");
    }

    #[test]
    fn test_uppercase_hex_is_not_decoded() {
        // Uppercase digits are not part of the hex escape form; `1F600` is
        // not a registered block either, so the escape falls through to an
        // escaped 'u'.
        let mut s = Scanner::new("\\u{1F600}");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.literal, "u");
        assert!(g.escaped);
    }

    #[test]
    fn test_escaped_ellipsis() {
        let mut s = Scanner::new("\\...x");
        let g = s.read_grapheme().unwrap();
        assert_eq!(g.literal, "...");
        assert!(g.escaped);
        assert_eq!(s.read_grapheme().unwrap().literal, "x");
    }
}
