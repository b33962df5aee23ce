//! Built-in tag rules and their named rendering handlers.
//!
//! The handlers here form the registry that [`RenderMode::Named`] resolves
//! against at registration time; hosts can reuse them when assembling
//! custom rule tables.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;

use crate::config::Config;
use crate::template;
use crate::util;

use super::{
    CallbackResult, ClassSet, ContainmentClass, ContentPolicy, EndTagPolicy, RuleSet,
    TagAction, TagCallback, TagInvocation, TagRule,
};

/// Resolves a built-in handler by name.
pub(crate) fn registry(name: &str) -> Option<TagCallback> {
    let handler: fn(&Config, TagAction, &TagInvocation<'_>) -> CallbackResult = match name {
        "url" => url_tag,
        "email" => email_tag,
        "img" => img_tag,
        "size" => size_tag,
        "quote" => quote_tag,
        "list" => list_tag,
        "wiki" => wiki_tag,
        "rule" => rule_tag,
        _ => return None,
    };
    Some(Arc::new(handler))
}

/// The default rule table.
pub fn default_rule_set() -> RuleSet {
    let mut set = RuleSet::empty();
    let mut add = |name: &str, rule: TagRule| {
        set.add_rule(name, rule)
            .expect("default rule table is valid");
    };

    add("b", TagRule::simple("<b>", "</b>"));
    add("i", TagRule::simple("<i>", "</i>"));
    add("u", TagRule::simple("<u>", "</u>"));
    add("s", TagRule::simple("<s>", "</s>"));
    add("sub", TagRule::simple("<sub>", "</sub>"));
    add("sup", TagRule::simple("<sup>", "</sup>"));

    add(
        "font",
        TagRule::enhanced(r#"<span style="font-family:{$_default/tw}">{$_content/v}</span>"#)
            .allow("_default", r"^[\w, -]+$"),
    );
    add(
        "color",
        TagRule::enhanced(r#"<span style="color:{$_default/tw}">{$_content/v}</span>"#)
            .allow("_default", r"^#?[a-zA-Z0-9]+$"),
    );
    add("size", TagRule::named("size"));
    add(
        "acronym",
        TagRule::enhanced(r#"<acronym title="{$_default/e}">{$_content/v}</acronym>"#),
    );

    add(
        "url",
        TagRule::named("url")
            .class(ContainmentClass::Link)
            .allow_in(ClassSet::INLINE_CONTEXT.difference(ClassSet::LINK))
            .content(ContentPolicy::Required)
            .plain(r#"<a href="{$link/e}">"#, "</a>")
            .plain_content(&["_content", "_default"])
            .plain_link(&["_default", "_content"]),
    );
    add(
        "email",
        TagRule::named("email")
            .class(ContainmentClass::Link)
            .allow_in(ClassSet::INLINE_CONTEXT.difference(ClassSet::LINK))
            .content(ContentPolicy::Required)
            .plain_content(&["_content", "_default"]),
    );
    add(
        "wiki",
        TagRule::named("wiki")
            .class(ContainmentClass::Link)
            .allow_in(ClassSet::INLINE_CONTEXT.difference(ClassSet::LINK))
            .end_tag(EndTagPolicy::Prohibit)
            .content(ContentPolicy::Prohibit)
            .plain_content(&["title", "_default"]),
    );
    add(
        "img",
        TagRule::named("img")
            .class(ContainmentClass::Image)
            .content(ContentPolicy::Required)
            .plain_content(&["alt"]),
    );

    add(
        "rule",
        TagRule::named("rule")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .end_tag(EndTagPolicy::Prohibit)
            .content(ContentPolicy::Prohibit)
            .trim_tag("sns", "sns")
            .plain("\n", "\n"),
    );
    add(
        "br",
        TagRule::simple("<br />\n", "")
            .end_tag(EndTagPolicy::Prohibit)
            .content(ContentPolicy::Prohibit)
            .plain("\n", ""),
    );

    add(
        "center",
        TagRule::simple(r#"<div class="bbcode_center" style="text-align:center">"#, "</div>")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "left",
        TagRule::simple(r#"<div class="bbcode_left" style="text-align:left">"#, "</div>")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "right",
        TagRule::simple(r#"<div class="bbcode_right" style="text-align:right">"#, "</div>")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "indent",
        TagRule::simple(r#"<div class="bbcode_indent">"#, "</div>")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .trim_all()
            .plain("\n", "\n"),
    );

    add(
        "columns",
        TagRule::simple(
            r#"<table class="bbcode_columns"><tbody><tr><td class="bbcode_column">"#,
            "</td></tr></tbody></table>",
        )
        .class(ContainmentClass::Columns)
        .allow_in(ClassSet::BLOCK_CONTEXT)
        .trim_all()
        .plain("\n", "\n"),
    );
    add(
        "nextcol",
        TagRule::simple(r#"</td><td class="bbcode_column">"#, "")
            .class(ContainmentClass::NextCol)
            .allow_in(ClassSet::COLUMNS)
            .end_tag(EndTagPolicy::Prohibit)
            .content(ContentPolicy::Prohibit)
            .trim_tag("sns", "sns")
            .plain("\n", ""),
    );

    add(
        "code",
        TagRule::enhanced(r#"<div class="bbcode_code"><pre>{$_content/h}</pre></div>"#)
            .class(ContainmentClass::Code)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .content(ContentPolicy::Verbatim)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "quote",
        TagRule::named("quote")
            .class(ContainmentClass::Block)
            .allow_in(ClassSet::BLOCK_CONTEXT)
            .content(ContentPolicy::Required)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "list",
        TagRule::named("list")
            .class(ContainmentClass::List)
            .allow_in(ClassSet::BLOCK_CONTEXT.union(ClassSet::LIST_ITEM))
            .content(ContentPolicy::Required)
            .trim_all()
            .plain("\n", "\n"),
    );
    add(
        "*",
        TagRule::simple("<li>", "</li>")
            .class(ContainmentClass::ListItem)
            .allow_in(ClassSet::LIST)
            .end_tag(EndTagPolicy::Optional)
            .trim_all()
            .plain("\n", ""),
    );

    set
}

static LOCAL_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[\w ./+-]+\.(gif|jpe?g|png|webp|svg)$").unwrap());

static WIKI_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\x00-\x1F]{1,80}$").unwrap());

static LIST_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[1aAiI]|circle|square|disc)$").unwrap());

fn str_value(key: &str, value: &str, map: &mut Map<String, serde_json::Value>) {
    map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
}

/// ` target="..."` for link tags, honoring the forced target and the
/// targetable toggle.
fn link_target(cfg: &Config, inv: &TagInvocation<'_>) -> String {
    let target = match (&cfg.url_target, cfg.url_targetable) {
        (Some(forced), _) => Some(forced.as_str()),
        (None, true) => inv.param("target"),
        (None, false) => None,
    };
    match target {
        Some(t) if !t.is_empty() => format!(
            " target=\"{}\"",
            html_escape::encode_double_quoted_attribute(t)
        ),
        _ => String::new(),
    }
}

fn url_tag(cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    match action {
        TagAction::Check => match inv.default {
            Some(d) if !util::is_valid_url(d) => CallbackResult::Reject,
            _ => CallbackResult::Accept,
        },
        TagAction::Output => {
            let url = match inv.default {
                Some(d) => d.trim().to_string(),
                None => util::unescape_html(inv.content).trim().to_string(),
            };
            if !util::is_valid_url(&url) {
                return CallbackResult::Reject;
            }
            let content = if inv.content.is_empty() {
                util::escape_html(&url, false)
            } else {
                inv.content.to_string()
            };
            let mut values = Map::new();
            str_value("url", &url, &mut values);
            str_value("target", &link_target(cfg, inv), &mut values);
            str_value("content", &content, &mut values);
            CallbackResult::Rendered(template::fill(&cfg.url_template, &values, None))
        }
    }
}

fn email_tag(cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    match action {
        TagAction::Check => match inv.default {
            Some(d) if !util::is_valid_email(d) => CallbackResult::Reject,
            _ => CallbackResult::Accept,
        },
        TagAction::Output => {
            let email = match inv.default {
                Some(d) => d.trim().to_string(),
                None => util::unescape_html(inv.content).trim().to_string(),
            };
            if !util::is_valid_email(&email) {
                return CallbackResult::Reject;
            }
            let content = if inv.content.is_empty() {
                util::escape_html(&email, false)
            } else {
                inv.content.to_string()
            };
            let mut values = Map::new();
            str_value("email", &email, &mut values);
            str_value("content", &content, &mut values);
            CallbackResult::Rendered(template::fill(&cfg.email_template, &values, None))
        }
    }
}

fn img_tag(cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    match action {
        TagAction::Check => CallbackResult::Accept,
        TagAction::Output => {
            let src = util::unescape_html(inv.content);
            let src = src.trim();
            if src.is_empty() {
                return CallbackResult::Reject;
            }
            let src = if util::is_valid_url(src) {
                src.to_string()
            } else if LOCAL_IMG.is_match(src) && !src.contains("..") {
                format!("{}/{src}", cfg.local_img_url.trim_end_matches('/'))
            } else {
                return CallbackResult::Reject;
            };

            let alt = match inv.param("alt") {
                Some(alt) if !alt.is_empty() => alt.to_string(),
                _ => util::basename(&src).to_string(),
            };
            let mut dims = String::new();
            if let (Some(w), Some(h)) = (
                inv.param("width").and_then(|v| v.parse::<u32>().ok()),
                inv.param("height").and_then(|v| v.parse::<u32>().ok()),
            ) {
                dims = format!(" width=\"{w}\" height=\"{h}\"");
            }
            CallbackResult::Rendered(format!(
                r#"<img src="{}" alt="{}"{dims} class="bbcode_img" />"#,
                html_escape::encode_double_quoted_attribute(&src),
                html_escape::encode_double_quoted_attribute(&alt),
            ))
        }
    }
}

fn size_tag(_cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    const SIZES: [&str; 7] = ["0.6em", "0.75em", "1em", "1.25em", "1.5em", "2em", "3em"];
    let index = inv
        .default
        .and_then(|d| d.parse::<usize>().ok())
        .filter(|n| (1..=SIZES.len()).contains(n));
    match action {
        TagAction::Check => match index {
            Some(_) => CallbackResult::Accept,
            None => CallbackResult::Reject,
        },
        TagAction::Output => match index {
            Some(n) => CallbackResult::Rendered(format!(
                r#"<span style="font-size:{}">{}</span>"#,
                SIZES[n - 1],
                inv.content
            )),
            None => CallbackResult::Reject,
        },
    }
}

fn quote_tag(cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    match action {
        TagAction::Check => CallbackResult::Accept,
        TagAction::Output => {
            let title = match inv.default {
                Some(who) if !who.trim().is_empty() => format!("{} wrote:", who.trim()),
                _ => "Quote:".to_string(),
            };
            let mut values = Map::new();
            str_value("title", &title, &mut values);
            str_value("content", inv.content, &mut values);
            CallbackResult::Rendered(template::fill(&cfg.quote_template, &values, None))
        }
    }
}

fn list_tag(_cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    let style = inv.default.filter(|d| !d.is_empty());
    match action {
        TagAction::Check => match style {
            Some(s) if !LIST_STYLE.is_match(s) => CallbackResult::Reject,
            _ => CallbackResult::Accept,
        },
        TagAction::Output => {
            let (open, close) = match style {
                None => (r#"<ul class="bbcode_list">"#.to_string(), "</ul>"),
                Some(s) => {
                    let list_type = match s {
                        "1" => "decimal",
                        "a" => "lower-alpha",
                        "A" => "upper-alpha",
                        "i" => "lower-roman",
                        "I" => "upper-roman",
                        "circle" | "square" | "disc" => s,
                        _ => return CallbackResult::Reject,
                    };
                    let element = if matches!(s, "circle" | "square" | "disc") {
                        "ul"
                    } else {
                        "ol"
                    };
                    (
                        format!(
                            r#"<{element} class="bbcode_list" style="list-style-type:{list_type}">"#
                        ),
                        if element == "ul" { "</ul>" } else { "</ol>" },
                    )
                }
            };
            CallbackResult::Rendered(format!("{open}{}{close}", inv.content))
        }
    }
}

fn wiki_tag(cfg: &Config, action: TagAction, inv: &TagInvocation<'_>) -> CallbackResult {
    let name = inv.default.map(str::trim).unwrap_or("");
    if name.is_empty() || !WIKI_NAME.is_match(name) {
        return CallbackResult::Reject;
    }
    match action {
        TagAction::Check => CallbackResult::Accept,
        TagAction::Output => {
            let title = match inv.param("title") {
                Some(t) if !t.is_empty() => t,
                _ => name,
            };
            let mut values = Map::new();
            str_value("wikiURL", &cfg.wiki_url, &mut values);
            str_value("name", name, &mut values);
            str_value("title", title, &mut values);
            CallbackResult::Rendered(template::fill(&cfg.wiki_template, &values, None))
        }
    }
}

fn rule_tag(cfg: &Config, action: TagAction, _inv: &TagInvocation<'_>) -> CallbackResult {
    match action {
        TagAction::Check => CallbackResult::Accept,
        TagAction::Output => CallbackResult::Rendered(cfg.rule_html.clone()),
    }
}
