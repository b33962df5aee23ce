use crate::config::TagMarker;

use super::{Lexer, TokenKind};

fn lex(input: &str) -> Lexer<'_> {
    Lexer::new(input, TagMarker::Square)
}

#[test]
pub fn empty_input_is_immediately_eof() {
    let mut lexer = lex("");
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}

#[test]
pub fn just_text() {
    let mut lexer = lex("hello world");
    assert_eq!(lexer.next_token().kind, TokenKind::Text);
    assert_eq!(lexer.next_token().kind, TokenKind::Whitespace);
    let tk = lexer.next_token();
    assert_eq!(tk.kind, TokenKind::Text);
    assert_eq!(tk.text, "world");
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}

#[test]
pub fn simple_tags() {
    let mut lexer = lex("[b]x[/b]");
    let open = lexer.next_token();
    assert_eq!(open.kind, TokenKind::StartTag);
    assert_eq!(open.tag.as_ref().unwrap().name, "b");
    assert!(!open.tag.as_ref().unwrap().is_end_tag);

    assert_eq!(lexer.next_token().kind, TokenKind::Text);

    let close = lexer.next_token();
    assert_eq!(close.kind, TokenKind::EndTag);
    assert_eq!(close.tag.as_ref().unwrap().name, "b");
    assert!(close.tag.as_ref().unwrap().is_end_tag);
}

#[test]
pub fn tag_names_are_lowercased() {
    let mut lexer = lex("[B][/B]");
    assert_eq!(lexer.next_token().tag.unwrap().name, "b");
    assert_eq!(lexer.next_token().tag.unwrap().name, "b");
}

#[test]
pub fn unquoted_multiword_default() {
    let mut lexer = lex("[font=Times New Roman size=1]");
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.name, "font");
    assert_eq!(tag.default.as_deref(), Some("Times New Roman"));
    assert_eq!(tag.param("size"), Some("1"));
}

#[test]
pub fn quoted_default_and_params() {
    let mut lexer = lex(r#"[url="http://x" title='My Title']"#);
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.default.as_deref(), Some("http://x"));
    assert_eq!(tag.param("title"), Some("My Title"));
}

#[test]
pub fn duplicate_params_first_wins_in_map() {
    let mut lexer = lex("[a x=1 x=2]");
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.param("x"), Some("1"));
    assert_eq!(tag.params.len(), 2);
}

#[test]
pub fn underscore_keys_are_reserved() {
    let mut lexer = lex("[a _x=1 y=2]");
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.param("_x"), None);
    assert_eq!(tag.param("y"), Some("2"));
    assert!(tag.params.iter().any(|(k, _)| k == "_x"));
}

#[test]
pub fn malformed_tag_degrades_to_text() {
    let mut lexer = lex("[ b]x");
    let tk = lexer.next_token();
    assert_eq!(tk.kind, TokenKind::Text);
    assert_eq!(tk.text, "[ b]");
    assert_eq!(lexer.next_token().text, "x");
}

#[test]
pub fn wiki_links_decode_specially() {
    let mut lexer = lex("[[Main Page|The Main Page]]");
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.name, "wiki");
    assert_eq!(tag.default.as_deref(), Some("Main Page"));
    assert_eq!(tag.param("title"), Some("The Main Page"));
}

#[test]
pub fn wiki_link_without_title() {
    let mut lexer = lex("[[Sandbox]]");
    let tag = lexer.next_token().tag.unwrap();
    assert_eq!(tag.name, "wiki");
    assert_eq!(tag.default.as_deref(), Some("Sandbox"));
    assert_eq!(tag.param("title"), None);
}

#[test]
pub fn comments_vanish() {
    let mut lexer = lex("a[!-- hidden --]b");
    assert_eq!(lexer.next_token().text, "a");
    assert_eq!(lexer.next_token().text, "b");
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);

    let mut lexer = lex("a['note]b");
    assert_eq!(lexer.next_token().text, "a");
    assert_eq!(lexer.next_token().text, "b");
}

#[test]
pub fn five_hyphens_make_a_rule() {
    let mut lexer = lex("-----");
    let tk = lexer.next_token();
    assert_eq!(tk.kind, TokenKind::StartTag);
    assert_eq!(tk.tag.unwrap().name, "rule");

    let mut lexer = lex("----");
    let tk = lexer.next_token();
    assert_eq!(tk.kind, TokenKind::Text);
    assert_eq!(tk.text, "----");
}

#[test]
pub fn newline_classification() {
    let mut lexer = lex("a\r\nb\nc");
    assert_eq!(lexer.next_token().text, "a");
    let nl = lexer.next_token();
    assert_eq!(nl.kind, TokenKind::Newline);
    assert_eq!(nl.text, "\r\n");
    assert_eq!(lexer.next_token().text, "b");
    assert_eq!(lexer.next_token().kind, TokenKind::Newline);
    assert_eq!(lexer.next_token().text, "c");
}

#[test]
pub fn peek_does_not_advance() {
    let mut lexer = lex("[b]x");
    let peeked = lexer.peek_token();
    let read = lexer.next_token();
    assert_eq!(peeked.kind, read.kind);
    assert_eq!(peeked.text, read.text);
    assert_eq!(lexer.next_token().text, "x");
}

#[test]
#[should_panic(expected = "unget_token called twice")]
pub fn double_unget_fails_fast() {
    let mut lexer = lex("a b");
    let first = lexer.next_token();
    let second = first.clone();
    lexer.unget_token(first);
    lexer.unget_token(second);
}

#[test]
pub fn snapshot_and_restore() {
    let mut lexer = lex("[code]a b[/code]");
    assert_eq!(lexer.next_token().kind, TokenKind::StartTag);
    let snapshot = lexer.save();

    lexer.set_verbatim(true);
    assert_eq!(lexer.next_token().text, "a");
    assert_eq!(lexer.next_token().kind, TokenKind::Whitespace);
    assert_eq!(lexer.next_token().text, "b");
    lexer.restore(snapshot);

    assert!(!matches!(lexer.next_token().kind, TokenKind::Eof));
    // Verbatim mode was part of the snapshot, so tag detection is back on.
    let mut lexer2 = lex("[code]x[/code]");
    lexer2.next_token();
    let snap = lexer2.save();
    lexer2.set_verbatim(true);
    lexer2.restore(snap);
    assert_eq!(lexer2.next_token().kind, TokenKind::Text);
    assert_eq!(lexer2.next_token().kind, TokenKind::EndTag);
}

#[test]
pub fn verbatim_suppresses_tag_detection() {
    let mut lexer = lex("x [b] y");
    lexer.set_verbatim(true);
    assert_eq!(lexer.next_token().kind, TokenKind::Text);
    assert_eq!(lexer.next_token().kind, TokenKind::Whitespace);
    let tk = lexer.next_token();
    assert_eq!(tk.kind, TokenKind::Text);
    assert_eq!(tk.text, "[b]");
    assert!(tk.tag.is_none());
}

#[test]
pub fn angle_markers() {
    let mut lexer = Lexer::new("<b>x</b>", TagMarker::Angle);
    assert_eq!(lexer.next_token().tag.unwrap().name, "b");
    assert_eq!(lexer.next_token().text, "x");
    assert_eq!(lexer.next_token().kind, TokenKind::EndTag);
}
