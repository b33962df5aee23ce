//! The tokenizer: a pattern splitter feeding a two-state classification
//! machine with one token of lookahead.
//!
//! The input is split up front by one marker-specific master pattern into
//! alternating text / non-text fragments. Classification then walks the
//! fragment array: even positions are plain text, odd positions are
//! delimiters (newlines, whitespace runs, horizontal rules, comments, wiki
//! links, and bracketed tags). In verbatim mode classification is
//! suppressed and every fragment comes back as text, whitespace, or
//! newline by leading character class alone.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TagMarker;

mod split;
pub(crate) mod tag;

pub use tag::TagData;

pub(crate) use split::split_captured;

/// Token classification produced by [`Lexer::next_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Input exhausted. `next_token` keeps returning this.
    Eof,
    /// A run of non-newline whitespace.
    Whitespace,
    /// A single newline (`\r\n`, `\r`, or `\n`).
    Newline,
    /// Plain text, including fragments that failed to decode as tags.
    Text,
    /// A decoded start tag; `tag` is always present.
    StartTag,
    /// A decoded end tag; `tag` is always present.
    EndTag,
}

/// One token. Borrows its source text from the input string.
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub tag: Option<TagData>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, text: &'a str) -> Self {
        Self { kind, text, tag: None }
    }

    fn with_tag(kind: TokenKind, text: &'a str, tag: TagData) -> Self {
        Self { kind, text, tag: Some(tag) }
    }

    fn eof() -> Self {
        Self::new(TokenKind::Eof, "")
    }
}

/// The marker-specific pattern set, compiled once per marker style.
struct MarkerPatterns {
    /// Master pattern the input is split on.
    main: Regex,
    /// A whole fragment forming a `[!-- ... --]` block comment.
    block_comment: Regex,
    /// A whole fragment forming a `['...]` line comment.
    line_comment: Regex,
    /// A whole `[[target|title]]` wiki link, with target/title captures.
    wiki: Regex,
    /// Tag-shaped spans, for the approximate text-length estimate.
    strip_tags: Regex,
}

impl MarkerPatterns {
    fn compile(marker: TagMarker) -> Self {
        let b = regex::escape(&marker.begin().to_string());
        let e = regex::escape(&marker.end().to_string());
        let main = Regex::new(&format!(
            "{b}{b}[^{b}{e}\\r\\n]+{e}{e}\
             |{b}(?:[^{b}{e}\\r\\n]|\"[^\"\\r\\n]*\"|'[^'\\r\\n]*')*{e}\
             |\\r\\n|\\r|\\n\
             |[\\x00-\\x09\\x0B\\x0C\\x0E-\\x20]+\
             |-{{5,}}"
        ))
        .unwrap();
        let block_comment =
            Regex::new(&format!("^{b}!--(?:[^-]|-[^-])*--{e}$")).unwrap();
        let line_comment = Regex::new(&format!("^{b}'[^{e}\\r\\n]*{e}$")).unwrap();
        let wiki = Regex::new(&format!(
            "^{b}{b}([^{b}{e}\\r\\n|]+)(?:\\|([^{b}{e}\\r\\n]*))?{e}{e}$"
        ))
        .unwrap();
        let strip_tags = Regex::new(&format!("{b}[^{b}{e}\\r\\n]*{e}")).unwrap();
        Self { main, block_comment, line_comment, wiki, strip_tags }
    }
}

static SQUARE: Lazy<MarkerPatterns> = Lazy::new(|| MarkerPatterns::compile(TagMarker::Square));
static ANGLE: Lazy<MarkerPatterns> = Lazy::new(|| MarkerPatterns::compile(TagMarker::Angle));
static BRACE: Lazy<MarkerPatterns> = Lazy::new(|| MarkerPatterns::compile(TagMarker::Brace));
static PAREN: Lazy<MarkerPatterns> = Lazy::new(|| MarkerPatterns::compile(TagMarker::Paren));

fn patterns(marker: TagMarker) -> &'static MarkerPatterns {
    match marker {
        TagMarker::Square => &SQUARE,
        TagMarker::Angle => &ANGLE,
        TagMarker::Brace => &BRACE,
        TagMarker::Paren => &PAREN,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    ExpectText,
    ExpectTagLike,
}

impl LexState {
    fn toggle(&mut self) {
        *self = match self {
            LexState::ExpectText => LexState::ExpectTagLike,
            LexState::ExpectTagLike => LexState::ExpectText,
        };
    }
}

/// Saved tokenizer position for speculative parsing. Restoring rolls the
/// cursor, classification state, verbatim flag and pending lookahead token
/// back to the values captured at save time; the fragment array itself is
/// never mutated and needs no copy.
#[derive(Clone)]
pub struct LexerSnapshot<'a> {
    cursor: usize,
    state: LexState,
    verbatim: bool,
    pending: Option<Token<'a>>,
}

/// The tokenizer.
pub struct Lexer<'a> {
    marker: TagMarker,
    patterns: &'static MarkerPatterns,
    fragments: Vec<&'a str>,
    cursor: usize,
    state: LexState,
    verbatim: bool,
    pending: Option<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, marker: TagMarker) -> Self {
        let patterns = patterns(marker);
        Self {
            marker,
            patterns,
            fragments: split_captured(&patterns.main, input),
            cursor: 0,
            state: LexState::ExpectText,
            verbatim: false,
            pending: None,
        }
    }

    pub fn marker(&self) -> TagMarker {
        self.marker
    }

    /// In verbatim mode tag and comment detection is suppressed entirely;
    /// every fragment is returned as text, whitespace, or newline.
    pub fn set_verbatim(&mut self, on: bool) {
        self.verbatim = on;
    }

    /// Approximate visible-text length of `input`: everything except
    /// tag-shaped spans. Never an underestimate of the true text length.
    pub(crate) fn strip_tags_len(input: &str, marker: TagMarker) -> usize {
        let mut len = input.len();
        for m in patterns(marker).strip_tags.find_iter(input) {
            len -= m.as_str().len();
        }
        len
    }

    /// Reads the next token. Returns [`TokenKind::Eof`] forever once the
    /// fragment array is exhausted.
    pub fn next_token(&mut self) -> Token<'a> {
        if let Some(tk) = self.pending.take() {
            return tk;
        }
        loop {
            let Some(&fragment) = self.fragments.get(self.cursor) else {
                return Token::eof();
            };
            let state = self.state;
            self.cursor += 1;
            self.state.toggle();
            if fragment.is_empty() {
                continue;
            }
            if self.verbatim {
                return self.classify_verbatim(fragment);
            }
            match state {
                LexState::ExpectText => return Token::new(TokenKind::Text, fragment),
                LexState::ExpectTagLike => match self.classify_delimiter(fragment) {
                    Some(token) => return token,
                    // Comments vanish without producing a token.
                    None => continue,
                },
            }
        }
    }

    /// Requeues `token` so the next [`Lexer::next_token`] replays it.
    /// Only one token of lookahead exists; a second unget without an
    /// intervening read is a bug in the caller and fails fast.
    pub fn unget_token(&mut self, token: Token<'a>) {
        assert!(
            self.pending.is_none(),
            "unget_token called twice without an intervening read"
        );
        self.pending = Some(token);
    }

    /// Reads the next token and immediately requeues it.
    pub fn peek_token(&mut self) -> Token<'a> {
        let token = self.next_token();
        self.unget_token(token.clone());
        token
    }

    pub fn save(&self) -> LexerSnapshot<'a> {
        LexerSnapshot {
            cursor: self.cursor,
            state: self.state,
            verbatim: self.verbatim,
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: LexerSnapshot<'a>) {
        self.cursor = snapshot.cursor;
        self.state = snapshot.state;
        self.verbatim = snapshot.verbatim;
        self.pending = snapshot.pending;
    }

    fn classify_verbatim(&self, fragment: &'a str) -> Token<'a> {
        match fragment.as_bytes()[0] {
            b'\r' | b'\n' => Token::new(TokenKind::Newline, fragment),
            b if b <= 0x20 => Token::new(TokenKind::Whitespace, fragment),
            _ => Token::new(TokenKind::Text, fragment),
        }
    }

    fn classify_delimiter(&self, fragment: &'a str) -> Option<Token<'a>> {
        let first = fragment.chars().next().unwrap_or('\0');
        if first == '\r' || first == '\n' {
            return Some(Token::new(TokenKind::Newline, fragment));
        }
        if first != '-' && (first.is_whitespace() || first.is_control()) {
            return Some(Token::new(TokenKind::Whitespace, fragment));
        }
        if first == '-' {
            // Five or more hyphens: a pre-classified horizontal rule.
            return Some(Token::with_tag(
                TokenKind::StartTag,
                fragment,
                TagData::new("rule"),
            ));
        }
        debug_assert_eq!(first, self.marker.begin());
        if self.patterns.block_comment.is_match(fragment)
            || self.patterns.line_comment.is_match(fragment)
        {
            return None;
        }
        if let Some(caps) = self.patterns.wiki.captures(fragment) {
            let mut tag = TagData::new("wiki");
            tag.default = Some(caps[1].trim().to_string());
            if let Some(title) = caps.get(2) {
                tag.push_param("title".into(), title.as_str().trim().to_string());
            }
            return Some(Token::with_tag(TokenKind::StartTag, fragment, tag));
        }
        match tag::decode(fragment, self.marker) {
            Some(tag) if tag.is_end_tag => {
                Some(Token::with_tag(TokenKind::EndTag, fragment, tag))
            }
            Some(tag) => Some(Token::with_tag(TokenKind::StartTag, fragment, tag)),
            // Not decodable as a tag; degrade to literal text.
            None => Some(Token::new(TokenKind::Text, fragment)),
        }
    }
}

#[cfg(test)]
mod tests;
