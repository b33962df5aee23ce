//! Tag rules: the static per-tag configuration consulted by the parsing
//! automaton, and the CHECK/OUTPUT evaluator dispatched over rendering
//! modes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::template;

pub mod builtins;

bitflags! {
    /// A set of containment classes, used for a rule's allowed parents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ClassSet: u16 {
        const BLOCK = 1 << 0;
        const INLINE = 1 << 1;
        const LINK = 1 << 2;
        const LIST = 1 << 3;
        const LIST_ITEM = 1 << 4;
        const COLUMNS = 1 << 5;
        const NEXT_COL = 1 << 6;
        const IMAGE = 1 << 7;
        const CODE = 1 << 8;

        /// Everywhere ordinary inline markup may appear.
        const INLINE_CONTEXT = Self::BLOCK.bits()
            | Self::INLINE.bits()
            | Self::LINK.bits()
            | Self::LIST_ITEM.bits()
            | Self::COLUMNS.bits();
        /// Everywhere a block-level construct may appear.
        const BLOCK_CONTEXT = Self::BLOCK.bits() | Self::COLUMNS.bits();
    }
}

/// The structural category a tag establishes for its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainmentClass {
    Block,
    Inline,
    Link,
    List,
    ListItem,
    Columns,
    NextCol,
    Image,
    Code,
}

impl ContainmentClass {
    pub fn as_set(self) -> ClassSet {
        match self {
            ContainmentClass::Block => ClassSet::BLOCK,
            ContainmentClass::Inline => ClassSet::INLINE,
            ContainmentClass::Link => ClassSet::LINK,
            ContainmentClass::List => ClassSet::LIST,
            ContainmentClass::ListItem => ClassSet::LIST_ITEM,
            ContainmentClass::Columns => ClassSet::COLUMNS,
            ContainmentClass::NextCol => ClassSet::NEXT_COL,
            ContainmentClass::Image => ClassSet::IMAGE,
            ContainmentClass::Code => ClassSet::CODE,
        }
    }
}

/// What the parser does about a tag's end tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndTagPolicy {
    /// The tag never takes an end tag and resolves immediately.
    Prohibit,
    /// An end tag is welcome but a missing one is silently repaired.
    Optional,
    /// An end tag is expected; a missing one is repaired and a later
    /// stray end tag of the same name is swallowed.
    #[default]
    Required,
}

/// What the parser does about a tag's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentPolicy {
    Prohibit,
    #[default]
    Optional,
    Required,
    /// Body is consumed byte-for-byte up to the literal end tag, with no
    /// markup interpretation at all.
    Verbatim,
}

/// Which half of the rule protocol a callback is being asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Validate the tag. Expected results: `Accept` or `Reject`.
    Check,
    /// Render the tag. Expected results: `Rendered` or `Reject`.
    Output,
}

/// Result of a callback invocation. Failures are ordinary values here;
/// a rejected tag degrades to literal text, it never aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Accept,
    Reject,
    Rendered(String),
}

/// One tag occurrence as seen by checks and renderers.
#[derive(Debug, Clone, Copy)]
pub struct TagInvocation<'a> {
    /// Lowercased tag name.
    pub name: &'a str,
    /// The `=value` from the start tag, if any.
    pub default: Option<&'a str>,
    /// Parameters in source order, `_`-keys included.
    pub params: &'a [(String, String)],
    /// Rendered body content. Empty at check time.
    pub content: &'a str,
}

impl<'a> TagInvocation<'a> {
    /// First occurrence of a parameter by key; `_`-keys are reserved.
    pub fn param(&self, key: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| !k.starts_with('_') && k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A rendering handler: one function serving both protocol actions.
pub type TagCallback =
    Arc<dyn Fn(&Config, TagAction, &TagInvocation<'_>) -> CallbackResult + Send + Sync>;

/// How a tag renders, resolved once at registration time.
#[derive(Clone)]
pub enum RenderMode {
    /// Fixed start/end strings around the body.
    Simple { start: String, end: String },
    /// A template filled with the tag's parameters and pseudo-parameters.
    Enhanced { template: String },
    /// A handler looked up by name in the built-in registry when the rule
    /// is registered. Never present in a registered rule.
    Named(String),
    /// An arbitrary handler function.
    Callback(TagCallback),
}

impl fmt::Debug for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Simple { start, end } => {
                f.debug_struct("Simple").field("start", start).field("end", end).finish()
            }
            RenderMode::Enhanced { template } => {
                f.debug_struct("Enhanced").field("template", template).finish()
            }
            RenderMode::Named(name) => f.debug_tuple("Named").field(name).finish(),
            RenderMode::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Static configuration for one tag name. Build with the constructor for
/// the rendering mode and chain the remaining settings; registration via
/// [`RuleSet::add_rule`] validates patterns and resolves named handlers.
#[derive(Debug, Clone)]
pub struct TagRule {
    pub mode: RenderMode,
    /// The class this tag establishes for its contents.
    pub class: ContainmentClass,
    /// The classes this tag may appear inside.
    pub allow_in: ClassSet,
    pub end_tag: EndTagPolicy,
    pub content: ContentPolicy,
    /// Parameter validation patterns, as written. Compiled at registration.
    pub allow_patterns: Vec<(String, String)>,
    pub(crate) allow: Vec<(String, Regex)>,
    /// Fallback values for [`RenderMode::Enhanced`] templates.
    pub default: Map<String, Value>,
    /// Plain-mode wrapper templates; both see `{$link}`.
    pub plain_start: Option<String>,
    pub plain_end: Option<String>,
    /// Ordered candidate sources for plain-mode body content.
    pub plain_content: Vec<String>,
    /// Ordered candidate sources for a plain-mode link target.
    pub plain_link: Vec<String>,
    /// Whitespace-trim patterns around the four tag boundaries.
    pub before_tag: String,
    pub after_tag: String,
    pub before_endtag: String,
    pub after_endtag: String,
}

impl TagRule {
    fn with_mode(mode: RenderMode) -> Self {
        Self {
            mode,
            class: ContainmentClass::Inline,
            allow_in: ClassSet::INLINE_CONTEXT,
            end_tag: EndTagPolicy::Required,
            content: ContentPolicy::Optional,
            allow_patterns: Vec::new(),
            allow: Vec::new(),
            default: Map::new(),
            plain_start: None,
            plain_end: None,
            plain_content: Vec::new(),
            plain_link: Vec::new(),
            before_tag: String::new(),
            after_tag: String::new(),
            before_endtag: String::new(),
            after_endtag: String::new(),
        }
    }

    pub fn simple(start: &str, end: &str) -> Self {
        Self::with_mode(RenderMode::Simple { start: start.into(), end: end.into() })
    }

    pub fn enhanced(template: &str) -> Self {
        Self::with_mode(RenderMode::Enhanced { template: template.into() })
    }

    pub fn named(handler: &str) -> Self {
        Self::with_mode(RenderMode::Named(handler.into()))
    }

    pub fn callback(handler: TagCallback) -> Self {
        Self::with_mode(RenderMode::Callback(handler))
    }

    pub fn class(mut self, class: ContainmentClass) -> Self {
        self.class = class;
        self
    }

    pub fn allow_in(mut self, classes: ClassSet) -> Self {
        self.allow_in = classes;
        self
    }

    pub fn end_tag(mut self, policy: EndTagPolicy) -> Self {
        self.end_tag = policy;
        self
    }

    pub fn content(mut self, policy: ContentPolicy) -> Self {
        self.content = policy;
        self
    }

    pub fn allow(mut self, param: &str, pattern: &str) -> Self {
        self.allow_patterns.push((param.into(), pattern.into()));
        self
    }

    pub fn default_value(mut self, key: &str, value: &str) -> Self {
        self.default.insert(key.into(), Value::String(value.into()));
        self
    }

    pub fn plain(mut self, start: &str, end: &str) -> Self {
        self.plain_start = Some(start.into());
        self.plain_end = Some(end.into());
        self
    }

    pub fn plain_content(mut self, sources: &[&str]) -> Self {
        self.plain_content = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn plain_link(mut self, sources: &[&str]) -> Self {
        self.plain_link = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Trim patterns run before and after the start tag.
    pub fn trim_tag(mut self, before: &str, after: &str) -> Self {
        self.before_tag = before.into();
        self.after_tag = after.into();
        self
    }

    /// Trim patterns run before and after the end tag.
    pub fn trim_endtag(mut self, before: &str, after: &str) -> Self {
        self.before_endtag = before.into();
        self.after_endtag = after.into();
        self
    }

    /// The common block-tag shape: all four boundaries trim surrounding
    /// whitespace plus one newline.
    pub fn trim_all(self) -> Self {
        self.trim_tag("sns", "sns").trim_endtag("sns", "sns")
    }
}

/// Rule registration failures. These are configuration errors surfaced to
/// the host; they can never arise from markup input.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("tag name may not be empty")]
    EmptyName,
    #[error("no built-in handler named `{0}`")]
    UnknownHandler(String),
    #[error("invalid allow pattern for parameter `{param}`")]
    BadAllowPattern {
        param: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// The replaceable tag-rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: HashMap<String, TagRule>,
}

impl RuleSet {
    /// The built-in default table.
    pub fn defaults() -> Self {
        builtins::default_rule_set()
    }

    /// A table with no rules at all; every tag degrades to literal text.
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Registers (or replaces) a rule. Named handlers are resolved against
    /// the built-in registry and `allow` patterns are compiled here, so a
    /// bad rule is rejected up front instead of surprising a later parse.
    pub fn add_rule(&mut self, name: &str, mut rule: TagRule) -> Result<(), RuleError> {
        if name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if let RenderMode::Named(handler) = &rule.mode {
            let resolved = builtins::registry(handler)
                .ok_or_else(|| RuleError::UnknownHandler(handler.clone()))?;
            rule.mode = RenderMode::Callback(resolved);
        }
        rule.allow = rule
            .allow_patterns
            .iter()
            .map(|(param, pattern)| {
                Regex::new(pattern)
                    .map(|re| (param.clone(), re))
                    .map_err(|err| RuleError::BadAllowPattern {
                        param: param.clone(),
                        source: Box::new(err),
                    })
            })
            .collect::<Result<_, _>>()?;
        self.rules.insert(name.to_ascii_lowercase(), rule);
        Ok(())
    }

    /// Looks a rule up by (lowercase) tag name.
    pub fn get(&self, name: &str) -> Option<&TagRule> {
        self.rules.get(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.rules.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Restores the built-in default for one tag name, if there is one.
    pub fn reset(&mut self, name: &str) -> bool {
        match Self::defaults().rules.remove(name) {
            Some(rule) => {
                self.rules.insert(name.to_string(), rule);
                true
            }
            None => self.rules.remove(name).is_some(),
        }
    }

    /// Replaces the whole table with the built-in defaults.
    pub fn reset_all(&mut self) {
        *self = Self::defaults();
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Resolves a parameter reference in an `allow` map or a plain-mode
/// candidate list, including the pseudo-parameters.
fn lookup_source<'a>(inv: &TagInvocation<'a>, key: &str) -> &'a str {
    match key {
        "_name" => inv.name,
        "_default" => inv.default.unwrap_or(""),
        "_content" => {
            if inv.content.is_empty() {
                inv.default.unwrap_or("")
            } else {
                inv.content
            }
        }
        "_defaultcontent" => match inv.default {
            Some(d) if !d.is_empty() => d,
            _ => inv.content,
        },
        _ => inv.param(key).unwrap_or(""),
    }
}

/// The CHECK half of the rule protocol: decides whether a tag occurrence
/// is acceptable. An `allow` map short-circuits the mode dispatch.
pub(crate) fn check_tag(rule: &TagRule, cfg: &Config, inv: &TagInvocation<'_>) -> bool {
    if !rule.allow.is_empty() {
        for (param, pattern) in &rule.allow {
            let value = lookup_source(inv, param);
            if !pattern.is_match(value) {
                log::trace!(target: "bbmark.rules", "[{}] rejected: `{param}`=`{value}`", inv.name);
                return false;
            }
        }
        return true;
    }
    match &rule.mode {
        RenderMode::Simple { .. } | RenderMode::Enhanced { .. } => true,
        RenderMode::Callback(cb) => match cb(cfg, TagAction::Check, inv) {
            CallbackResult::Accept => true,
            CallbackResult::Reject => false,
            CallbackResult::Rendered(_) => {
                log::warn!(target: "bbmark.rules", "[{}] check returned output; accepting", inv.name);
                true
            }
        },
        RenderMode::Named(handler) => {
            log::warn!(target: "bbmark.rules", "[{}] unresolved handler `{handler}`", inv.name);
            false
        }
    }
}

/// The OUTPUT half of the rule protocol: renders a tag occurrence with its
/// (already rendered) body. `None` means the tag degrades to literal text.
pub(crate) fn output_tag(
    rule: &TagRule,
    cfg: &Config,
    inv: &TagInvocation<'_>,
) -> Option<String> {
    if cfg.plain_mode {
        return Some(plain_output(rule, inv));
    }
    match &rule.mode {
        RenderMode::Simple { start, end } => {
            Some(format!("{start}{}{end}", inv.content))
        }
        RenderMode::Enhanced { template } => {
            let mut values = Map::new();
            for (key, value) in inv.params {
                if !key.starts_with('_') && !values.contains_key(key) {
                    values.insert(key.clone(), Value::String(value.clone()));
                }
            }
            values.insert("_name".into(), inv.name.into());
            values.insert("_default".into(), inv.default.unwrap_or("").into());
            values.insert("_content".into(), inv.content.into());
            values.insert(
                "_defaultcontent".into(),
                lookup_source(inv, "_defaultcontent").into(),
            );
            Some(template::fill(template, &values, Some(&rule.default)))
        }
        RenderMode::Callback(cb) => match cb(cfg, TagAction::Output, inv) {
            CallbackResult::Rendered(output) => Some(output),
            CallbackResult::Reject => None,
            CallbackResult::Accept => {
                log::warn!(target: "bbmark.rules", "[{}] output returned no text", inv.name);
                None
            }
        },
        RenderMode::Named(handler) => {
            log::warn!(target: "bbmark.rules", "[{}] unresolved handler `{handler}`", inv.name);
            None
        }
    }
}

/// Plain-mode rendering: body and link are chosen from the rule's ordered
/// candidate lists and wrapped with the plain templates.
fn plain_output(rule: &TagRule, inv: &TagInvocation<'_>) -> String {
    let content = if rule.plain_content.is_empty() {
        inv.content.to_string()
    } else {
        rule.plain_content
            .iter()
            .map(|key| lookup_source(inv, key))
            .find(|value| !value.is_empty())
            .unwrap_or("")
            .to_string()
    };

    let mut values = Map::new();
    if let Some(link) = rule
        .plain_link
        .iter()
        .map(|key| lookup_source(inv, key))
        .find(|value| !value.is_empty())
    {
        values.insert("link".into(), link.into());
    }

    let start = rule
        .plain_start
        .as_deref()
        .map(|t| template::fill(t, &values, None))
        .unwrap_or_default();
    let end = rule
        .plain_end
        .as_deref()
        .map(|t| template::fill(t, &values, None))
        .unwrap_or_default();
    format!("{start}{content}{end}")
}

#[cfg(test)]
mod tests;
