use crate::config::Config;

use super::*;

fn inv<'a>(name: &'a str, default: Option<&'a str>, content: &'a str) -> TagInvocation<'a> {
    TagInvocation { name, default, params: &[], content }
}

#[test]
pub fn defaults_cover_the_usual_tags() {
    let set = RuleSet::defaults();
    for name in ["b", "i", "u", "url", "img", "quote", "list", "*", "code", "rule", "wiki"] {
        assert!(set.get(name).is_some(), "missing default rule for {name}");
    }
}

#[test]
pub fn unknown_named_handler_is_a_registration_error() {
    let mut set = RuleSet::empty();
    let err = set.add_rule("x", TagRule::named("nope")).unwrap_err();
    assert!(matches!(err, RuleError::UnknownHandler(name) if name == "nope"));
}

#[test]
pub fn bad_allow_pattern_is_a_registration_error() {
    let mut set = RuleSet::empty();
    let err = set
        .add_rule("x", TagRule::simple("<x>", "</x>").allow("_default", "(["))
        .unwrap_err();
    assert!(matches!(err, RuleError::BadAllowPattern { param, .. } if param == "_default"));
}

#[test]
pub fn empty_name_is_rejected() {
    let mut set = RuleSet::empty();
    assert!(matches!(
        set.add_rule("", TagRule::simple("", "")),
        Err(RuleError::EmptyName)
    ));
}

#[test]
pub fn add_remove_reset() {
    let mut set = RuleSet::defaults();
    assert!(set.remove("b"));
    assert!(set.get("b").is_none());
    assert!(set.reset("b"));
    assert!(set.get("b").is_some());

    set.add_rule("b", TagRule::simple("<strong>", "</strong>")).unwrap();
    match &set.get("b").unwrap().mode {
        RenderMode::Simple { start, .. } => assert_eq!(start, "<strong>"),
        other => panic!("unexpected mode {other:?}"),
    }
    set.reset_all();
    match &set.get("b").unwrap().mode {
        RenderMode::Simple { start, .. } => assert_eq!(start, "<b>"),
        other => panic!("unexpected mode {other:?}"),
    }

    set.clear();
    assert!(set.get("b").is_none());
}

#[test]
pub fn registration_lowercases_names() {
    let mut set = RuleSet::empty();
    set.add_rule("Shout", TagRule::simple("<b>", "</b>")).unwrap();
    assert!(set.get("shout").is_some());
}

#[test]
pub fn allow_map_validates_parameters() {
    let cfg = Config::default();
    let set = RuleSet::defaults();
    let color = set.get("color").unwrap();
    assert!(check_tag(color, &cfg, &inv("color", Some("red"), "")));
    assert!(check_tag(color, &cfg, &inv("color", Some("#ff0000"), "")));
    assert!(!check_tag(color, &cfg, &inv("color", Some("red; evil"), "")));
}

#[test]
pub fn simple_mode_concatenates() {
    let cfg = Config::default();
    let set = RuleSet::defaults();
    let b = set.get("b").unwrap();
    assert_eq!(output_tag(b, &cfg, &inv("b", None, "hi")).as_deref(), Some("<b>hi</b>"));
}

#[test]
pub fn enhanced_mode_fills_its_template() {
    let cfg = Config::default();
    let set = RuleSet::defaults();
    let acronym = set.get("acronym").unwrap();
    let out = output_tag(acronym, &cfg, &inv("acronym", Some("World Health Organization"), "WHO"));
    assert_eq!(
        out.as_deref(),
        Some(r#"<acronym title="World Health Organization">WHO</acronym>"#)
    );
}

#[test]
pub fn url_callback_renders_and_rejects() {
    let cfg = Config::default();
    let set = RuleSet::defaults();
    let url = set.get("url").unwrap();

    let out = output_tag(url, &cfg, &inv("url", Some("http://example.com/"), "site"));
    assert_eq!(
        out.as_deref(),
        Some(r#"<a href="http://example.com/" class="bbcode_url">site</a>"#)
    );

    assert!(output_tag(url, &cfg, &inv("url", Some("javascript:alert(1)"), "x")).is_none());
    assert!(!check_tag(url, &cfg, &inv("url", Some("javascript:alert(1)"), "")));
}

#[test]
pub fn forced_link_target() {
    let cfg = Config { url_target: Some("_blank".into()), ..Config::default() };
    let set = RuleSet::defaults();
    let url = set.get("url").unwrap();
    let out = output_tag(url, &cfg, &inv("url", Some("http://example.com/"), "x")).unwrap();
    assert!(out.contains(r#" target="_blank""#));
}

#[test]
pub fn list_style_validation() {
    let cfg = Config::default();
    let set = RuleSet::defaults();
    let list = set.get("list").unwrap();
    assert!(check_tag(list, &cfg, &inv("list", None, "")));
    assert!(check_tag(list, &cfg, &inv("list", Some("A"), "")));
    assert!(check_tag(list, &cfg, &inv("list", Some("circle"), "")));
    assert!(!check_tag(list, &cfg, &inv("list", Some("z"), "")));

    let out = output_tag(list, &cfg, &inv("list", Some("1"), "<li>x</li>")).unwrap();
    assert_eq!(
        out,
        r#"<ol class="bbcode_list" style="list-style-type:decimal"><li>x</li></ol>"#
    );
}

#[test]
pub fn plain_mode_projects_content_and_link() {
    let cfg = Config { plain_mode: true, ..Config::default() };
    let set = RuleSet::defaults();

    let b = set.get("b").unwrap();
    assert_eq!(output_tag(b, &cfg, &inv("b", None, "hi")).as_deref(), Some("hi"));

    let url = set.get("url").unwrap();
    let out = output_tag(url, &cfg, &inv("url", Some("http://x/"), "site")).unwrap();
    assert_eq!(out, r#"<a href="http://x/">site</a>"#);
}

#[test]
pub fn callback_result_mismatch_degrades() {
    let cfg = Config::default();
    let mut set = RuleSet::empty();
    set.add_rule(
        "odd",
        TagRule::callback(std::sync::Arc::new(|_, action, _inv| match action {
            TagAction::Check => CallbackResult::Rendered("surprise".into()),
            TagAction::Output => CallbackResult::Accept,
        })),
    )
    .unwrap();
    let odd = set.get("odd").unwrap();
    // A check that answers with output is accepted with a warning; an
    // output that answers with a bare accept is a rejection.
    assert!(check_tag(odd, &cfg, &inv("odd", None, "")));
    assert!(output_tag(odd, &cfg, &inv("odd", None, "x")).is_none());
}
