//! The parsing automaton and output generator.
//!
//! This is the central stack machine: it consumes tokens, tracks the
//! current containment class, decides per-tag disposition (isolated,
//! verbatim, or deferred on the stack) and performs the document-tree walk
//! without ever materializing a tree. The stack doubles as the pending
//! output buffer; closing a tag collapses everything above its slot into
//! one rendered text entry.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;
use static_assertions::assert_impl_all;

use crate::config::Config;
use crate::lexer::{Lexer, TagData, TokenKind};
use crate::rules::{ContainmentClass, RuleSet};
use crate::template;
use crate::trim::{self, TrimItem, TrimKind};
use crate::util;

mod output;
mod tags;

/// One slot of the parse stack. Simultaneously a pending-output fragment
/// (for text, whitespace and newline entries) and the record of an open
/// start tag awaiting its end tag or forced closure.
///
/// Invariant: `class` is the containment class that was current at the
/// moment the entry was pushed, so the class of the top entry (or the root
/// class for an empty stack) is always the current class.
#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) tag: Option<TagData>,
    pub(crate) class: ContainmentClass,
}

impl TrimItem for StackEntry {
    fn trim_kind(&self) -> TrimKind {
        match self.kind {
            TokenKind::Whitespace => TrimKind::Space,
            TokenKind::Newline => TrimKind::Newline,
            _ => TrimKind::Other,
        }
    }
}

static URL_DETECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:https?://|ftp://|www\.)[^\s<>"']+"#).unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n(?:[ \t]*\n)+").unwrap());

/// The engine: a rule table plus session configuration, reusable across
/// many sequential parses. All per-parse mutable state lives in a session
/// created fresh for every call, so nothing leaks between parses; `parse`
/// takes `&mut self` to make a parse exclusive and to record the
/// truncation flag.
pub struct BBCode {
    cfg: Config,
    rules: RuleSet,
    was_limited: bool,
}

assert_impl_all!(BBCode: Send, Sync);

impl BBCode {
    /// An engine with the default configuration and rule table.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(cfg: Config) -> Self {
        Self::with_rules(cfg, RuleSet::defaults())
    }

    pub fn with_rules(cfg: Config, rules: RuleSet) -> Self {
        Self { cfg, rules, was_limited: false }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.cfg
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    /// Whether the most recent [`BBCode::parse`] hit the output limit.
    pub fn was_limited(&self) -> bool {
        self.was_limited
    }

    /// Converts one markup string to HTML (or plain text in plain mode).
    /// Malformed markup never fails: unknown or rejected tags degrade to
    /// literal text and nesting violations are repaired.
    pub fn parse(&mut self, input: &str) -> String {
        let (output, limited) = Parser::new(&self.cfg, &self.rules, input).run();
        self.was_limited = limited;
        output
    }
}

impl Default for BBCode {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-parse session state.
pub(crate) struct Parser<'a> {
    cfg: &'a Config,
    rules: &'a RuleSet,
    lexer: Lexer<'a>,
    stack: Vec<StackEntry>,
    /// Stack indices of still-open start tags, by name, innermost last.
    start_tags: HashMap<String, Vec<usize>>,
    /// Start tags already force-closed whose literal end tag may still
    /// arrive and must then be swallowed.
    lost_start_tags: HashMap<String, usize>,
    current_class: ContainmentClass,
    output_len: usize,
    /// Exact length accounting enabled; decided up front by the
    /// approximate-length fast path.
    check_limit: bool,
    was_limited: bool,
    halted: bool,
    emoji_pattern: Option<Regex>,
    emoji_left: Option<usize>,
}

impl<'a> Parser<'a> {
    fn new(cfg: &'a Config, rules: &'a RuleSet, input: &'a str) -> Self {
        let check_limit = cfg.output_limit > 0 && {
            let estimate = Lexer::strip_tags_len(input, cfg.tag_marker);
            estimate as f32 >= cfg.output_limit as f32 * (1.0 - cfg.limit_precision)
        };
        Self {
            cfg,
            rules,
            lexer: Lexer::new(input, cfg.tag_marker),
            stack: Vec::new(),
            start_tags: HashMap::new(),
            lost_start_tags: HashMap::new(),
            current_class: cfg.root_class,
            output_len: 0,
            check_limit,
            was_limited: false,
            halted: false,
            emoji_pattern: emoji_pattern(cfg),
            emoji_left: cfg.emoji_max,
        }
    }

    fn run(mut self) -> (String, bool) {
        trim::eat_input(&self.cfg.pre_trim, &mut self.lexer);
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Text => self.do_text(token.text),
                TokenKind::Whitespace => self.do_whitespace(token.text),
                TokenKind::Newline => self.do_newline(),
                TokenKind::StartTag => self.do_start_tag(&token),
                TokenKind::EndTag => self.do_end_tag(&token),
            }
            if self.halted {
                break;
            }
        }
        trim::pop_trailing(&self.cfg.post_trim, &mut self.stack);
        let mut out = self.generate_output(0);
        if self.cfg.plain_mode {
            out = BLANK_LINES.replace_all(&out, "\n\n").trim().to_string();
        }
        (out, self.was_limited)
    }

    fn push(&mut self, kind: TokenKind, text: String) {
        let class = self.current_class;
        self.stack.push(StackEntry { kind, text, tag: None, class });
    }

    fn do_text(&mut self, text: &str) {
        if self.hit_limit(text.len()) {
            self.do_limit(text);
            return;
        }
        self.output_len += text.len();
        let rendered = self.format_text(text);
        self.push(TokenKind::Text, rendered);
    }

    fn do_whitespace(&mut self, text: &str) {
        if self.hit_limit(text.len()) {
            self.do_limit("");
            return;
        }
        self.output_len += text.len();
        self.push(TokenKind::Whitespace, text.to_string());
    }

    /// A newline pops any pending trailing whitespace, becomes a
    /// line-break marker (or ordinary whitespace in ignore-newlines mode),
    /// and then eats the whitespace immediately following it.
    fn do_newline(&mut self) {
        if self.hit_limit(1) {
            self.do_limit("");
            return;
        }
        self.output_len += 1;
        if self.cfg.ignore_newlines {
            self.push(TokenKind::Whitespace, "\n".to_string());
            return;
        }
        trim::pop_trailing("s", &mut self.stack);
        let marker = if self.cfg.plain_mode { "\n" } else { "<br>\n" };
        self.push(TokenKind::Newline, marker.to_string());
        trim::eat_input("s", &mut self.lexer);
    }

    /// Pushes source text that failed to be a tag, escaped, as plain text.
    fn push_literal(&mut self, text: &str) {
        if self.hit_limit(text.len()) {
            self.do_limit(text);
            return;
        }
        self.output_len += text.len();
        let rendered = self.escape_fragment(text);
        self.push(TokenKind::Text, rendered);
    }

    fn hit_limit(&self, len: usize) -> bool {
        self.check_limit && self.output_len + len >= self.cfg.output_limit
    }

    /// Truncates at the output limit: chop the offending fragment at its
    /// last whitespace boundary under the limit, drop pending trailing
    /// whitespace, append the tail marker, and ignore all further input.
    fn do_limit(&mut self, text: &str) {
        let available = self.cfg.output_limit.saturating_sub(self.output_len);
        let chopped = chop_at_whitespace(text, available);
        if !chopped.is_empty() {
            self.output_len += chopped.len();
            let rendered = self.format_text(chopped);
            self.push(TokenKind::Text, rendered);
        }
        trim::pop_trailing("a", &mut self.stack);
        let tail = self.cfg.limit_tail.clone();
        self.push(TokenKind::Text, tail);
        self.was_limited = true;
        self.halted = true;
        log::debug!(target: "bbmark.parser", "output limit of {} reached", self.cfg.output_limit);
    }

    /// Emoji substitution, URL auto-detection and escaping for one plain
    /// text fragment. Plain mode emits the raw text.
    fn format_text(&mut self, text: &str) -> String {
        if self.cfg.plain_mode {
            return text.to_string();
        }
        if !self.cfg.detect_urls {
            return self.format_segment(text);
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in URL_DETECT.find_iter(text) {
            out.push_str(&self.format_segment(&text[last..m.start()]));
            out.push_str(&self.render_detected_url(m.as_str()));
            last = m.end();
        }
        out.push_str(&self.format_segment(&text[last..]));
        out
    }

    fn render_detected_url(&self, url: &str) -> String {
        let mut values = Map::new();
        values.insert("url".to_string(), url.into());
        values.insert("text".to_string(), url.into());
        template::fill(&self.cfg.url_pattern, &values, None)
    }

    fn format_segment(&mut self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let Some(pattern) = self.emoji_pattern.clone() else {
            return self.escape_fragment(text);
        };
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in pattern.find_iter(text) {
            if self.emoji_left == Some(0) {
                break;
            }
            out.push_str(&self.escape_fragment(&text[last..m.start()]));
            out.push_str(&self.render_emoji(m.as_str()));
            if let Some(left) = self.emoji_left.as_mut() {
                *left -= 1;
            }
            last = m.end();
        }
        out.push_str(&self.escape_fragment(&text[last..]));
        out
    }

    fn render_emoji(&self, code: &str) -> String {
        let file = self
            .cfg
            .emoji
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.file.as_str())
            .unwrap_or_default();
        format!(
            r#"<img src="{}/{}" alt="{}" class="bbcode_emoji" />"#,
            self.cfg.emoji_url.trim_end_matches('/'),
            html_escape::encode_double_quoted_attribute(file),
            html_escape::encode_double_quoted_attribute(code),
        )
    }

    fn escape_fragment(&self, text: &str) -> String {
        if self.cfg.plain_mode || !self.cfg.escape_content {
            text.to_string()
        } else {
            util::escape_html(text, self.cfg.allow_ampersand)
        }
    }
}

/// The longest prefix of `text` that fits in `limit` bytes and ends at a
/// whitespace boundary. Fragments without internal whitespace chop to
/// nothing rather than mid-word.
fn chop_at_whitespace(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    match text[..cut].rfind(|c: char| c.is_whitespace()) {
        Some(idx) => &text[..idx],
        None => "",
    }
}

/// Longest-code-first alternation over the configured emoji table.
fn emoji_pattern(cfg: &Config) -> Option<Regex> {
    if !cfg.emoji_enabled || cfg.emoji.is_empty() {
        return None;
    }
    let mut codes: Vec<&str> = cfg
        .emoji
        .iter()
        .map(|e| e.code.as_str())
        .filter(|code| !code.is_empty())
        .collect();
    if codes.is_empty() {
        return None;
    }
    codes.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = codes
        .iter()
        .map(|code| regex::escape(code))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).ok()
}
