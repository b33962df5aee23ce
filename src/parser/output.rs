//! The output collapse: the tree walk without a tree.

use crate::lexer::TokenKind;
use crate::rules::{self, ClassSet, ContainmentClass, EndTagPolicy};
use crate::trim;

use super::tags::invocation;
use super::{Parser, StackEntry};

impl<'a> Parser<'a> {
    /// The class of the top stack entry, or the root class when empty.
    pub(super) fn compute_current_class(&self) -> ContainmentClass {
        self.stack
            .last()
            .map(|entry| entry.class)
            .unwrap_or(self.cfg.root_class)
    }

    /// Collapses every entry at or above `pos` into one rendered string,
    /// popping from the top. Text, whitespace and newline entries join the
    /// reversed buffer as-is. A pending start tag whose end tag may be
    /// omitted is resolved on the spot: its own end-tag trim runs against
    /// the buffer, everything collapsed so far becomes its body, and the
    /// buffer is replaced by the single rendered fragment. A `Required`
    /// policy additionally records a lost start tag so the stray end tag
    /// arriving later is swallowed instead of mis-rendered.
    pub(super) fn generate_output(&mut self, pos: usize) -> String {
        debug_assert!(pos <= self.stack.len());
        let mut collapsed: Vec<StackEntry> = Vec::new();
        while self.stack.len() > pos {
            let mut entry = self.stack.pop().expect("stack is non-empty");
            if entry.kind != TokenKind::StartTag {
                collapsed.push(entry);
                continue;
            }

            let name = entry
                .tag
                .as_ref()
                .map(|tag| tag.name.clone())
                .unwrap_or_default();
            self.pop_start_loc(&name, self.stack.len());
            let table = self.rules;
            match table.get(&name) {
                Some(rule) if rule.end_tag != EndTagPolicy::Prohibit => {
                    if rule.end_tag == EndTagPolicy::Required {
                        *self.lost_start_tags.entry(name.clone()).or_insert(0) += 1;
                    }
                    // The body's trailing whitespace sits at the front of
                    // the reversed buffer.
                    let skip = trim::skip_forward(&rule.before_endtag, &collapsed, 0);
                    let mut body = String::new();
                    for item in collapsed[skip..].iter().rev() {
                        body.push_str(&item.text);
                    }

                    if let Some(tag) = entry.tag.as_mut() {
                        tag.has_end_tag = true;
                        let marker = self.cfg.tag_marker;
                        tag.end_tag_text =
                            Some(format!("{}/{}{}", marker.begin(), tag.name, marker.end()));
                    }
                    let tag = entry.tag.as_ref().expect("start entry carries tag data");
                    let inv = invocation(tag, &body);
                    let rendered = match rules::output_tag(rule, self.cfg, &inv) {
                        Some(rendered) => rendered,
                        None => format!("{}{body}", self.escape_fragment(&entry.text)),
                    };
                    log::trace!(target: "bbmark.parser", "force-closed [{name}]");
                    collapsed.clear();
                    collapsed.push(StackEntry {
                        kind: TokenKind::Text,
                        text: rendered,
                        tag: None,
                        class: entry.class,
                    });
                }
                _ => {
                    // A start tag that never takes an end tag should never
                    // sit on the stack; flatten it to literal text.
                    let text = self.escape_fragment(&entry.text);
                    collapsed.push(StackEntry {
                        kind: TokenKind::Text,
                        text,
                        tag: None,
                        class: entry.class,
                    });
                }
            }
        }

        let mut out = String::new();
        for item in collapsed.iter().rev() {
            out.push_str(&item.text);
        }
        out
    }

    /// Class-violation repair: close open tags back to the nearest entry
    /// whose class is allowed (or the empty stack, when the root class is
    /// allowed). Returns `false` when no safe rewind point exists and the
    /// incoming tag must be rejected instead.
    pub(super) fn rewind_to_class(&mut self, allowed: ClassSet) -> bool {
        let mut pos = self.stack.len();
        while pos > 0 && !allowed.contains(self.stack[pos - 1].class.as_set()) {
            pos -= 1;
        }
        if pos == 0 && !allowed.contains(self.cfg.root_class.as_set()) {
            return false;
        }
        if pos < self.stack.len() {
            log::trace!(
                target: "bbmark.parser",
                "rewinding {} entr(ies) to reach {allowed:?}",
                self.stack.len() - pos
            );
            let collapsed = self.generate_output(pos);
            let class = self.compute_current_class();
            if !collapsed.is_empty() {
                self.stack.push(StackEntry {
                    kind: TokenKind::Text,
                    text: collapsed,
                    tag: None,
                    class,
                });
            }
            self.current_class = class;
        } else {
            self.current_class = self.compute_current_class();
        }
        true
    }

    /// Drops the location record for a start tag being popped at `index`.
    pub(super) fn pop_start_loc(&mut self, name: &str, index: usize) {
        if let Some(locations) = self.start_tags.get_mut(name) {
            debug_assert_eq!(locations.last().copied(), Some(index));
            locations.pop();
            if locations.is_empty() {
                self.start_tags.remove(name);
            }
        }
    }
}
