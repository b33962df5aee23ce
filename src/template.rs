//! The template filler used to render tag output.
//!
//! Templates are literal text with `{$name.index/flags}` placeholders.
//! Values are JSON-shaped ([`serde_json::Value`]); placeholders resolve
//! against a value map with an optional fallback map of defaults, descend
//! `.index` chains into nested objects and arrays, and run their value
//! through zero or more single-letter formatting flags.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::util;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\$([A-Za-z0-9_]+)((?:\.[A-Za-z0-9_]+)*)(?:/([A-Za-z]*))?\}").unwrap()
});

static SQUASH_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x09\x0B\x0C\x0E-\x20]+").unwrap());

static NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Substitutes every placeholder in `template`, looking identifiers up in
/// `values` and falling back to `defaults`. Unresolvable placeholders
/// become empty strings; literal text is copied through untouched.
pub fn fill(template: &str, values: &Map<String, Value>, defaults: Option<&Map<String, Value>>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        let name = &caps[1];
        let indices = caps.get(2).map_or("", |m| m.as_str());
        let flags = caps.get(3).map_or("", |m| m.as_str());

        let value = values
            .get(name)
            .or_else(|| defaults.and_then(|d| d.get(name)));
        let resolved = value.map_or(String::new(), |v| coerce(descend(v, indices)));
        out.push_str(&apply_flags(resolved, flags));
    }
    out.push_str(&template[last..]);
    out
}

/// Walks a `.a.b.0` index chain into nested objects and arrays. Indexing
/// into anything else dead-ends as `None`.
fn descend<'v>(mut value: &'v Value, indices: &str) -> Option<&'v Value> {
    for key in indices.split('.').filter(|k| !k.is_empty()) {
        value = match value {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn coerce(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => if *b { "true" } else { "false" }.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Applies formatting flags in their fixed order. `v` (verbatim) wins over
/// everything else; of the four encoding flags only the first in priority
/// order `e`, `k`, `h`, `u` applies.
fn apply_flags(mut text: String, flags: &str) -> String {
    if flags.is_empty() {
        return text;
    }
    if flags.contains('v') {
        return text;
    }
    if flags.contains('w') {
        text = SQUASH_WS.replace_all(&text, " ").into_owned();
    }
    if flags.contains('t') {
        text = text.trim().to_string();
    }
    if flags.contains('b') {
        text = util::basename(&text).to_string();
    }
    if flags.contains('e') {
        text = html_escape::encode_safe(&text).into_owned();
    } else if flags.contains('k') {
        text = util::url_encode(&util::wikify(&text));
    } else if flags.contains('h') {
        text = html_escape::encode_double_quoted_attribute(&text).into_owned();
    } else if flags.contains('u') {
        text = util::url_encode(&text);
    }
    if flags.contains('n') {
        text = NEWLINE.replace_all(&text, "<br>\n").into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vals(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn literal_text_passes_through() {
        assert_eq!(fill("no placeholders", &Map::new(), None), "no placeholders");
    }

    #[test]
    fn simple_substitution() {
        let v = vals(&[("x", json!("hi"))]);
        assert_eq!(fill("say {$x}!", &v, None), "say hi!");
    }

    #[test]
    fn missing_value_is_empty() {
        assert_eq!(fill("[{$nope}]", &Map::new(), None), "[]");
    }

    #[test]
    fn defaults_fall_back() {
        let v = vals(&[("a", json!("A"))]);
        let d = vals(&[("a", json!("shadowed")), ("b", json!("B"))]);
        assert_eq!(fill("{$a}{$b}", &v, Some(&d)), "AB");
    }

    #[test]
    fn escape_flag() {
        let v = vals(&[("x", json!("<a>"))]);
        assert_eq!(fill("{$x/h}", &v, None), "&lt;a&gt;");
    }

    #[test]
    fn verbatim_suppresses_other_flags() {
        let v = vals(&[("x", json!("<a>"))]);
        assert_eq!(fill("{$x/v}", &v, None), "<a>");
        assert_eq!(fill("{$x/veh}", &v, None), "<a>");
    }

    #[test]
    fn whitespace_and_trim_flags() {
        let v = vals(&[("x", json!("  a \t b  "))]);
        assert_eq!(fill("{$x/wt}", &v, None), "a b");
    }

    #[test]
    fn basename_flag() {
        let v = vals(&[("x", json!("dir/sub/file.png"))]);
        assert_eq!(fill("{$x/b}", &v, None), "file.png");
    }

    #[test]
    fn url_encode_flag() {
        let v = vals(&[("x", json!("a b"))]);
        assert_eq!(fill("{$x/u}", &v, None), "a%20b");
    }

    #[test]
    fn wiki_flag_slugs_then_encodes() {
        let v = vals(&[("x", json!("Main Page"))]);
        assert_eq!(fill("{$x/k}", &v, None), "Main_Page");
    }

    #[test]
    fn newline_flag() {
        let v = vals(&[("x", json!("a\nb"))]);
        assert_eq!(fill("{$x/n}", &v, None), "a<br>\nb");
    }

    #[test]
    fn index_chain_descends_objects_and_arrays() {
        let v = vals(&[("x", json!({"inner": ["zero", "one"]}))]);
        assert_eq!(fill("{$x.inner.1}", &v, None), "one");
        assert_eq!(fill("{$x.missing.1}", &v, None), "");
    }

    #[test]
    fn indexing_scalar_is_empty() {
        let v = vals(&[("x", json!("scalar"))]);
        assert_eq!(fill("{$x.0}", &v, None), "");
    }

    #[test]
    fn coercions() {
        let v = vals(&[("b", json!(true)), ("n", json!(42)), ("o", json!({}))]);
        assert_eq!(fill("{$b}/{$n}/{$o}", &v, None), "true/42/");
    }
}
