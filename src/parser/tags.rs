//! Per-tag disposition: isolated, deferred, or verbatim.

use crate::lexer::{TagData, Token, TokenKind};
use crate::rules::{
    self, ContentPolicy, EndTagPolicy, TagInvocation, TagRule,
};
use crate::trim;

use super::{Parser, StackEntry};

pub(super) fn invocation<'t>(tag: &'t TagData, content: &'t str) -> TagInvocation<'t> {
    TagInvocation {
        name: &tag.name,
        default: tag.default.as_deref(),
        params: &tag.params,
        content,
    }
}

impl<'a> Parser<'a> {
    pub(super) fn do_start_tag(&mut self, token: &Token<'a>) {
        let tag = token.tag.as_ref().expect("start token carries tag data");
        let table = self.rules;
        let Some(rule) = table.get(&tag.name) else {
            log::trace!(target: "bbmark.parser", "unknown tag [{}]", tag.name);
            self.push_literal(token.text);
            return;
        };

        // Repair the nesting first: if this tag is not legal in the
        // current class, close open tags back to the nearest legal
        // ancestor, or reject the tag outright when there is none.
        if !rule.allow_in.contains(self.current_class.as_set())
            && !self.rewind_to_class(rule.allow_in)
        {
            self.push_literal(token.text);
            return;
        }

        if rule.end_tag == EndTagPolicy::Prohibit {
            self.do_isolated_tag(token, tag, rule);
        } else if rule.content == ContentPolicy::Verbatim {
            self.do_verbatim_tag(token, tag, rule);
        } else {
            self.do_deferred_tag(token, tag, rule);
        }
    }

    /// An isolated tag never takes an end tag: check, render with empty
    /// content, and push the result without occupying a stack slot.
    fn do_isolated_tag(&mut self, token: &Token<'a>, tag: &TagData, rule: &TagRule) {
        let inv = invocation(tag, "");
        if !rules::check_tag(rule, self.cfg, &inv) {
            self.push_literal(token.text);
            return;
        }
        trim::pop_trailing(&rule.before_tag, &mut self.stack);
        match rules::output_tag(rule, self.cfg, &inv) {
            Some(rendered) => self.push(TokenKind::Text, rendered),
            None => {
                self.push_literal(token.text);
                return;
            }
        }
        trim::eat_input(&rule.after_tag, &mut self.lexer);
    }

    /// A deferred tag occupies one stack slot until its end tag arrives or
    /// a collapse forces it closed.
    fn do_deferred_tag(&mut self, token: &Token<'a>, tag: &TagData, rule: &TagRule) {
        let inv = invocation(tag, "");
        if !rules::check_tag(rule, self.cfg, &inv) {
            self.push_literal(token.text);
            return;
        }
        trim::pop_trailing(&rule.before_tag, &mut self.stack);
        let index = self.stack.len();
        self.stack.push(StackEntry {
            kind: TokenKind::StartTag,
            text: token.text.to_string(),
            tag: Some(tag.clone()),
            class: rule.class,
        });
        self.current_class = rule.class;
        self.start_tags
            .entry(tag.name.clone())
            .or_default()
            .push(index);
        trim::eat_input(&rule.after_tag, &mut self.lexer);
    }

    /// A verbatim tag consumes input byte-for-byte up to its literal end
    /// tag, with tag and comment detection suppressed. If input runs out
    /// first, the start tag is rejected as literal text and the cursor is
    /// rewound to just after it.
    fn do_verbatim_tag(&mut self, token: &Token<'a>, tag: &TagData, rule: &TagRule) {
        let inv = invocation(tag, "");
        if !rules::check_tag(rule, self.cfg, &inv) {
            self.push_literal(token.text);
            return;
        }

        let marker = self.lexer.marker();
        let end_text = format!("{}/{}{}", marker.begin(), tag.name, marker.end());
        let snapshot = self.lexer.save();
        self.lexer.set_verbatim(true);
        trim::eat_input(&rule.after_tag, &mut self.lexer);

        let mut body: Vec<Token<'a>> = Vec::new();
        let mut end_source: Option<&'a str> = None;
        loop {
            let tk = self.lexer.next_token();
            if tk.kind == TokenKind::Eof {
                break;
            }
            if tk.text.eq_ignore_ascii_case(&end_text) {
                end_source = Some(tk.text);
                break;
            }
            body.push(tk);
        }
        self.lexer.set_verbatim(false);

        let Some(end_source) = end_source else {
            self.lexer.restore(snapshot);
            self.push_literal(token.text);
            return;
        };

        trim::pop_trailing(&rule.before_endtag, &mut body);
        let content: String = body.iter().map(|tk| tk.text).collect();
        self.output_len += content.len();

        let mut closed = tag.clone();
        closed.has_end_tag = true;
        closed.end_tag_text = Some(end_source.to_string());
        let inv = invocation(&closed, &content);
        match rules::output_tag(rule, self.cfg, &inv) {
            Some(rendered) => {
                trim::pop_trailing(&rule.before_tag, &mut self.stack);
                self.push(TokenKind::Text, rendered);
                trim::eat_input(&rule.after_endtag, &mut self.lexer);
            }
            None => {
                let literal = format!("{}{content}{end_source}", token.text);
                self.push_literal(&literal);
            }
        }
    }

    pub(super) fn do_end_tag(&mut self, token: &Token<'a>) {
        let tag = token.tag.as_ref().expect("end token carries tag data");
        let name = tag.name.as_str();

        let Some(index) = self.start_tags.get(name).and_then(|v| v.last().copied()) else {
            // A start tag of this name may already have been force-closed
            // by a collapse; its stray end tag is swallowed exactly once.
            if let Some(count) = self.lost_start_tags.get_mut(name) {
                if *count > 0 {
                    *count -= 1;
                    log::trace!(target: "bbmark.parser", "swallowed stray [/{name}]");
                    return;
                }
            }
            self.push_literal(token.text);
            return;
        };
        let table = self.rules;
        let Some(rule) = table.get(name) else {
            self.push_literal(token.text);
            return;
        };

        trim::pop_trailing(&rule.before_endtag, &mut self.stack);
        let body = self.generate_output(index + 1);
        let mut entry = self.stack.pop().expect("matching start tag on stack");
        debug_assert_eq!(self.stack.len(), index);
        self.pop_start_loc(name, index);

        if let Some(start_tag) = entry.tag.as_mut() {
            start_tag.has_end_tag = true;
            start_tag.end_tag_text = Some(token.text.to_string());
        }
        self.current_class = self.compute_current_class();

        let start_tag = entry.tag.as_ref().expect("start entry carries tag data");
        let inv = invocation(start_tag, &body);
        let rendered = match rules::output_tag(rule, self.cfg, &inv) {
            Some(rendered) => rendered,
            None => format!(
                "{}{body}{}",
                self.escape_fragment(&entry.text),
                self.escape_fragment(token.text)
            ),
        };
        self.push(TokenKind::Text, rendered);
        trim::eat_input(&rule.after_endtag, &mut self.lexer);
    }
}
