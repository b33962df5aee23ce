//! Single-pass pattern splitting for the tokenizer's master pattern.

use regex::Regex;

/// Splits `subject` on every match of `pattern`, keeping the matched
/// delimiters as elements. The result strictly alternates text and
/// delimiter, beginning and ending with a (possibly empty) text element;
/// the tokenizer's two-state cycle relies on that parity. An empty subject
/// yields an empty sequence.
pub(crate) fn split_captured<'a>(pattern: &Regex, subject: &'a str) -> Vec<&'a str> {
    if subject.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut last = 0;
    for m in pattern.find_iter(subject) {
        out.push(&subject[last..m.start()]);
        out.push(m.as_str());
        last = m.end();
    }
    out.push(&subject[last..]);
    out
}

/// Splits `subject` on every match of `pattern`, dropping delimiters and
/// empty elements.
#[allow(dead_code)]
pub(crate) fn split<'a>(pattern: &Regex, subject: &'a str) -> Vec<&'a str> {
    split_captured(pattern, subject)
        .into_iter()
        .step_by(2)
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(",+").unwrap());

    #[test]
    fn empty_subject_yields_empty_sequence() {
        assert!(split_captured(&COMMA, "").is_empty());
        assert!(split(&COMMA, "").is_empty());
    }

    #[test]
    fn alternation_invariant() {
        let parts = split_captured(&COMMA, "a,b,,c");
        assert_eq!(parts, vec!["a", ",", "b", ",,", "c"]);
        assert_eq!(parts.len() % 2, 1);
    }

    #[test]
    fn leading_and_trailing_delimiters_produce_empty_text() {
        let parts = split_captured(&COMMA, ",x,");
        assert_eq!(parts, vec!["", ",", "x", ",", ""]);
    }

    #[test]
    fn plain_split_drops_delims_and_empties() {
        assert_eq!(split(&COMMA, ",a,,b,"), vec!["a", "b"]);
    }
}
