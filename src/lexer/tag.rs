//! Decoding of one bracketed fragment into structured tag data.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TagMarker;

/// One decoded tag: `[name=default key=value ...]`.
///
/// Decoded fields are immutable once produced, except that `has_end_tag`
/// and `end_tag_text` are backfilled when the parser resolves (or
/// synthesizes) the matching end tag.
#[derive(Debug, Clone, Default)]
pub struct TagData {
    /// Tag name, lowercased, without any leading `/`.
    pub name: String,
    /// Whether the fragment was an end tag (`[/name]`).
    pub is_end_tag: bool,
    /// The `=value` following the name, if present.
    pub default: Option<String>,
    /// Whether a matching end tag was found or synthesized. Backfilled.
    pub has_end_tag: bool,
    /// Source text of the matching end tag. Backfilled.
    pub end_tag_text: Option<String>,
    /// Every parameter in source order, duplicates and `_`-keys included.
    pub params: Vec<(String, String)>,
    map: HashMap<String, String>,
}

impl TagData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Looks a parameter up by key; the first occurrence wins. Keys
    /// beginning with `_` are reserved and never resolvable here.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub(crate) fn push_param(&mut self, key: String, value: String) {
        if !key.starts_with('_') && !self.map.contains_key(&key) {
            self.map.insert(key.clone(), value.clone());
        }
        self.params.push((key, value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Ws(&'a str),
    Eq,
    Quoted(&'a str),
    Word(&'a str),
}

impl<'a> Piece<'a> {
    fn text(&self) -> &'a str {
        match self {
            Piece::Ws(s) | Piece::Quoted(s) | Piece::Word(s) => s,
            Piece::Eq => "=",
        }
    }

    fn is_ws(&self) -> bool {
        matches!(self, Piece::Ws(_))
    }
}

/// Splits a tag interior into alternating whitespace / quoted-string / `=` /
/// bare-word pieces. Stray unterminated quotes match nothing and are
/// dropped.
static PIECES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[^"\r\n]*"|'[^'\r\n]*'|=|[\x00-\x09\x0B\x0C\x0E-\x20]+|[^\s"'=]+"#).unwrap()
});

fn tokenize(inner: &str) -> Vec<Piece<'_>> {
    PIECES
        .find_iter(inner)
        .map(|m| {
            let s = m.as_str();
            match s.as_bytes()[0] {
                b'"' | b'\'' => Piece::Quoted(&s[1..s.len() - 1]),
                b'=' => Piece::Eq,
                b if b <= 0x20 => Piece::Ws(s),
                _ => Piece::Word(s),
            }
        })
        .collect()
}

/// Decodes one complete bracketed fragment, markers included. Returns
/// `None` when the fragment is not a well-formed tag (the caller then
/// degrades it to literal text).
pub(crate) fn decode(fragment: &str, marker: TagMarker) -> Option<TagData> {
    let inner = fragment
        .strip_prefix(marker.begin())?
        .strip_suffix(marker.end())?;
    let first = inner.chars().next()?;
    if first.is_whitespace() || first.is_control() {
        return None;
    }

    let pieces = tokenize(inner);
    let mut i = 0;

    let raw_name = match pieces.first()? {
        Piece::Word(w) => *w,
        _ => return None,
    };
    i += 1;
    let (name, is_end_tag) = match raw_name.strip_prefix('/') {
        Some(rest) => (rest, true),
        None => (raw_name, false),
    };
    if name.is_empty() {
        return None;
    }

    let mut tag = TagData::new(name.to_ascii_lowercase());
    tag.is_end_tag = is_end_tag;

    while pieces.get(i).is_some_and(Piece::is_ws) {
        i += 1;
    }

    if matches!(pieces.get(i), Some(Piece::Eq)) {
        i += 1;
        while pieces.get(i).is_some_and(Piece::is_ws) {
            i += 1;
        }
        match pieces.get(i) {
            Some(Piece::Quoted(q)) => {
                tag.default = Some((*q).to_string());
                i += 1;
            }
            Some(_) => i = decode_unquoted_default(&pieces, i, &mut tag),
            None => tag.default = Some(String::new()),
        }
    }

    decode_params(&pieces, i, &mut tag);
    Some(tag)
}

/// Forward-scans an unquoted default value. The value runs until the first
/// `=` that follows at least one whitespace piece, then backs off past the
/// trailing whitespace and the bare word before that `=` (they belong to
/// the next parameter), so `[font=Times New Roman size=1]` yields the
/// default `Times New Roman` and a separate `size=1` parameter.
fn decode_unquoted_default(pieces: &[Piece<'_>], start: usize, tag: &mut TagData) -> usize {
    let mut end = pieces.len();
    let mut seen_ws = false;
    let mut j = start;
    while j < pieces.len() {
        match pieces[j] {
            Piece::Eq if seen_ws => {
                let mut m = j - 1;
                while m > start && pieces[m - 1].is_ws() {
                    m -= 1;
                }
                end = m;
                break;
            }
            Piece::Ws(_) => seen_ws = true,
            _ => {}
        }
        j += 1;
    }

    let mut value = String::new();
    for piece in &pieces[start..end] {
        value.push_str(piece.text());
    }
    tag.default = Some(value.trim_end().to_string());
    end
}

/// Parses the remaining pieces as `key` / `key=value` pairs. An unquoted
/// value consumes bare words until the next whitespace piece.
fn decode_params(pieces: &[Piece<'_>], mut i: usize, tag: &mut TagData) {
    while i < pieces.len() {
        let key = match pieces[i] {
            Piece::Ws(_) | Piece::Eq => {
                i += 1;
                continue;
            }
            Piece::Word(w) => w,
            Piece::Quoted(q) => q,
        };
        i += 1;

        let mut value = String::new();
        if matches!(pieces.get(i), Some(Piece::Eq)) {
            i += 1;
            match pieces.get(i) {
                Some(Piece::Quoted(q)) => {
                    value.push_str(q);
                    i += 1;
                }
                Some(Piece::Word(_)) => {
                    while let Some(Piece::Word(w)) = pieces.get(i) {
                        value.push_str(w);
                        i += 1;
                    }
                }
                _ => {}
            }
        }
        tag.push_param(key.to_ascii_lowercase(), value);
    }
}
