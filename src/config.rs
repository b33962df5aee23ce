//! Session-level configuration shared read-only across parses.

use crate::rules::ContainmentClass;

/// The bracket style recognized for the whole parse. The matching end
/// marker is implied; the marker cannot change mid-parse because the
/// tokenizer's master pattern is marker-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagMarker {
    /// `[tag]`
    #[default]
    Square,
    /// `<tag>`
    Angle,
    /// `{tag}`
    Brace,
    /// `(tag)`
    Paren,
}

impl TagMarker {
    pub fn begin(self) -> char {
        match self {
            TagMarker::Square => '[',
            TagMarker::Angle => '<',
            TagMarker::Brace => '{',
            TagMarker::Paren => '(',
        }
    }

    pub fn end(self) -> char {
        match self {
            TagMarker::Square => ']',
            TagMarker::Angle => '>',
            TagMarker::Brace => '}',
            TagMarker::Paren => ')',
        }
    }
}

/// One emoji substitution: the literal code as typed, and the image file it
/// renders as (relative to [`Config::emoji_url`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    pub code: String,
    pub file: String,
}

/// Engine configuration. All fields have working defaults; construct with
/// `Config::default()` and override what you need.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bracket style for the whole parse.
    pub tag_marker: TagMarker,
    /// Containment class assumed when the stack is empty.
    pub root_class: ContainmentClass,
    /// Trim pattern run against the input before parsing starts.
    pub pre_trim: String,
    /// Trim pattern run against the pending output when input ends.
    pub post_trim: String,

    /// Maximum rendered text length in bytes; `0` disables truncation.
    pub output_limit: usize,
    /// Tolerance for the approximate-length fast path: inputs whose
    /// tag-stripped length is below `output_limit * (1 - limit_precision)`
    /// skip exact length accounting entirely.
    pub limit_precision: f32,
    /// Marker appended to truncated output.
    pub limit_tail: String,

    /// Render plain text instead of HTML.
    pub plain_mode: bool,
    /// Treat newlines as ordinary whitespace instead of line breaks.
    pub ignore_newlines: bool,
    /// Pass `&` through untouched instead of entity-escaping it.
    pub allow_ampersand: bool,
    /// HTML-escape plain text content. Disable only for trusted input.
    pub escape_content: bool,

    /// Wrap bare URLs found in plain text using [`Config::url_pattern`].
    pub detect_urls: bool,
    /// Template applied to auto-detected URLs; sees `{$url}` and `{$text}`.
    pub url_pattern: String,
    /// Honor a `target` parameter on link tags.
    pub url_targetable: bool,
    /// Force every link tag to this target, overriding any parameter.
    pub url_target: Option<String>,

    /// Template for `[url]` output; sees `{$url}`, `{$target}`, `{$content}`.
    pub url_template: String,
    /// Template for `[email]` output; sees `{$email}`, `{$content}`.
    pub email_template: String,
    /// Template for `[quote]` output; sees `{$title}`, `{$content}`.
    pub quote_template: String,
    /// Template for wiki links; sees `{$wikiURL}`, `{$name}`, `{$title}`.
    pub wiki_template: String,
    /// Base URL wiki page names are appended to.
    pub wiki_url: String,
    /// Base URL for `[img]` sources given as bare file names.
    pub local_img_url: String,
    /// Markup emitted for the horizontal-rule tag.
    pub rule_html: String,

    /// Emoji substitution table, applied to plain text when enabled.
    pub emoji: Vec<Emoji>,
    /// Enable emoji substitution.
    pub emoji_enabled: bool,
    /// Base URL emoji image files are served from.
    pub emoji_url: String,
    /// Maximum emoji substitutions per parse; `None` means unlimited.
    pub emoji_max: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tag_marker: TagMarker::Square,
            root_class: ContainmentClass::Block,
            pre_trim: String::new(),
            post_trim: String::new(),
            output_limit: 0,
            limit_precision: 0.15,
            limit_tail: "...".into(),
            plain_mode: false,
            ignore_newlines: false,
            allow_ampersand: false,
            escape_content: true,
            detect_urls: false,
            url_pattern: r#"<a href="{$url/h}">{$text/h}</a>"#.into(),
            url_targetable: false,
            url_target: None,
            url_template: r#"<a href="{$url/h}" class="bbcode_url"{$target/v}>{$content/v}</a>"#
                .into(),
            email_template: r#"<a href="mailto:{$email/h}" class="bbcode_email">{$content/v}</a>"#
                .into(),
            quote_template: concat!(
                "<blockquote class=\"bbcode_quote\">",
                "<div class=\"bbcode_quote_head\">{$title/h}</div>",
                "<div class=\"bbcode_quote_body\">{$content/v}</div>",
                "</blockquote>"
            )
            .into(),
            wiki_template: r#"<a href="{$wikiURL/v}{$name/k}" class="bbcode_wiki">{$title/h}</a>"#
                .into(),
            wiki_url: "/?page=".into(),
            local_img_url: "img".into(),
            rule_html: "<hr class=\"bbcode_rule\" />".into(),
            emoji: Vec::new(),
            emoji_enabled: false,
            emoji_url: "emoji".into(),
            emoji_max: None,
        }
    }
}
