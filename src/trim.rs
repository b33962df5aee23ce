//! Interpreter for the whitespace-trim patterns attached to tag rules.
//!
//! A pattern is a short string over the alphabet `s`, `n`, `a`, executed
//! left to right:
//!
//! - `s` consumes all contiguous non-newline whitespace items,
//! - `n` consumes at most one newline item,
//! - `a` consumes any run of whitespace or newline items.
//!
//! The same alphabet runs against three different stores: popping from the
//! top of a stack, advancing a read index over a slice without removing
//! anything, and eating tokens straight off the live tokenizer (with unget
//! to requeue the first item that does not match). An empty pattern is a
//! no-op in every mode.

use crate::lexer::{Lexer, Token, TokenKind};

/// What a trim pattern sees when it looks at one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrimKind {
    Space,
    Newline,
    Other,
}

/// Anything the trim interpreter can operate on.
pub(crate) trait TrimItem {
    fn trim_kind(&self) -> TrimKind;
}

impl TrimItem for Token<'_> {
    fn trim_kind(&self) -> TrimKind {
        match self.kind {
            TokenKind::Whitespace => TrimKind::Space,
            TokenKind::Newline => TrimKind::Newline,
            _ => TrimKind::Other,
        }
    }
}

/// Pops matching trailing items off the top of `items`.
pub(crate) fn pop_trailing<T: TrimItem>(pattern: &str, items: &mut Vec<T>) {
    for op in pattern.chars() {
        match op {
            's' => {
                while items.last().map(TrimItem::trim_kind) == Some(TrimKind::Space) {
                    items.pop();
                }
            }
            'n' => {
                if items.last().map(TrimItem::trim_kind) == Some(TrimKind::Newline) {
                    items.pop();
                }
            }
            'a' => {
                while matches!(
                    items.last().map(TrimItem::trim_kind),
                    Some(TrimKind::Space) | Some(TrimKind::Newline)
                ) {
                    items.pop();
                }
            }
            _ => {}
        }
    }
}

/// Advances an index over `items` past everything the pattern consumes,
/// leaving the slice itself untouched. Returns the new index.
pub(crate) fn skip_forward<T: TrimItem>(pattern: &str, items: &[T], mut idx: usize) -> usize {
    for op in pattern.chars() {
        match op {
            's' => {
                while items.get(idx).map(TrimItem::trim_kind) == Some(TrimKind::Space) {
                    idx += 1;
                }
            }
            'n' => {
                if items.get(idx).map(TrimItem::trim_kind) == Some(TrimKind::Newline) {
                    idx += 1;
                }
            }
            'a' => {
                while matches!(
                    items.get(idx).map(TrimItem::trim_kind),
                    Some(TrimKind::Space) | Some(TrimKind::Newline)
                ) {
                    idx += 1;
                }
            }
            _ => {}
        }
    }
    idx
}

/// Eats matching tokens directly from the tokenizer. The first token that
/// does not match is ungot so the caller sees it again.
pub(crate) fn eat_input(pattern: &str, lexer: &mut Lexer<'_>) {
    for op in pattern.chars() {
        match op {
            's' => loop {
                let tk = lexer.next_token();
                if tk.kind != TokenKind::Whitespace {
                    lexer.unget_token(tk);
                    break;
                }
            },
            'n' => {
                let tk = lexer.next_token();
                if tk.kind != TokenKind::Newline {
                    lexer.unget_token(tk);
                }
            }
            'a' => loop {
                let tk = lexer.next_token();
                if !matches!(tk.kind, TokenKind::Whitespace | TokenKind::Newline) {
                    lexer.unget_token(tk);
                    break;
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagMarker;

    struct Item(TrimKind);

    impl TrimItem for Item {
        fn trim_kind(&self) -> TrimKind {
            self.0
        }
    }

    fn items(desc: &str) -> Vec<Item> {
        desc.chars()
            .map(|c| match c {
                ' ' => Item(TrimKind::Space),
                'n' => Item(TrimKind::Newline),
                _ => Item(TrimKind::Other),
            })
            .collect()
    }

    #[test]
    fn pop_space_then_newline() {
        let mut v = items("x n ");
        pop_trailing("sns", &mut v);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn pop_single_newline_only() {
        let mut v = items("xnn");
        pop_trailing("n", &mut v);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn pop_any_run() {
        let mut v = items("x n n ");
        pop_trailing("a", &mut v);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn empty_pattern_is_noop() {
        let mut v = items("  nn");
        pop_trailing("", &mut v);
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn skip_forward_over_slice() {
        let v = items(" nx");
        assert_eq!(skip_forward("sn", &v, 0), 2);
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn eat_from_lexer() {
        let mut lexer = Lexer::new("  \nword", TagMarker::Square);
        eat_input("sn", &mut lexer);
        let tk = lexer.next_token();
        assert_eq!(tk.kind, TokenKind::Text);
        assert_eq!(tk.text, "word");
    }

    #[test]
    fn eat_requeues_nonmatching_token() {
        let mut lexer = Lexer::new("word", TagMarker::Square);
        eat_input("a", &mut lexer);
        assert_eq!(lexer.next_token().text, "word");
    }
}
