//! String helpers shared by the lexer, the template filler and the built-in
//! tag renderers: entity-aware HTML escaping, URL encoding and validation,
//! wiki slugs, and a small email syntax check.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a complete character entity, named or numeric.
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9]{1,31}|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});").unwrap()
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(?:(?:https?://|ftp://|mailto:)[^\s<>"']+|www\.[^\s<>"']+)$"#).unwrap()
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+$").unwrap()
});

/// HTML-escapes `text` without double-escaping entities that are already
/// present. `&` is only rewritten when it does not begin a well-formed
/// entity, so escaping is idempotent over this function's own output.
///
/// With `keep_ampersands` set, `&` is passed through untouched and only the
/// markup-significant characters are rewritten.
pub fn escape_html(text: &str, keep_ampersands: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '&' => {
                if keep_ampersands || ENTITY.is_match(&text[i + 1..]) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Decodes HTML entities back to plain text.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn url_encode(text: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push(HEX[(byte >> 4) as usize] as char);
                out.push(HEX[(byte & 0x0F) as usize] as char);
            }
        }
    }
    out
}

/// Converts a wiki page title into its address form: surrounding whitespace
/// dropped, inner whitespace runs collapsed to single underscores.
pub fn wikify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.trim().chars() {
        if ch.is_whitespace() {
            pending_sep = true;
        } else {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        }
    }
    out
}

/// The final path component of a `/`-separated path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Loose syntactic URL check for link-bearing tags. Accepts absolute
/// http/https/ftp/mailto URLs and bare `www.` hosts.
pub fn is_valid_url(url: &str) -> bool {
    !url.is_empty() && URL.is_match(url.trim())
}

/// Syntactic email address check. Deliberately stricter than RFC 5321:
/// quoted local parts and address literals are rejected.
pub fn is_valid_email(addr: &str) -> bool {
    let addr = addr.trim();
    addr.len() <= 254 && EMAIL.is_match(addr)
}
