//! Robust BBCode to HTML (or plain text) conversion with graceful
//! degradation: unknown and malformed tags become literal text, illegal
//! nesting is repaired instead of rejected, and output can be truncated,
//! escaped and templated safely.
//!
//! # Example
//!
//! ```
//! use bbmark::BBCode;
//!
//! let mut bbcode = BBCode::new();
//! assert_eq!(bbcode.parse("[b]hi[/b]"), "<b>hi</b>");
//! assert_eq!(bbcode.parse("[nope]x[/nope]"), "[nope]x[/nope]");
//! assert_eq!(bbcode.parse("[i][b]x[/i][/b]"), "<i><b>x</b></i>");
//! ```

mod config;
mod lexer;
mod parser;
mod rules;
mod template;
mod trim;
mod util;

pub use config::{Config, Emoji, TagMarker};
pub use lexer::{Lexer, LexerSnapshot, TagData, Token, TokenKind};
pub use parser::BBCode;
pub use rules::{
    builtins, CallbackResult, ClassSet, ContainmentClass, ContentPolicy, EndTagPolicy,
    RenderMode, RuleError, RuleSet, TagAction, TagCallback, TagInvocation, TagRule,
};
pub use template::fill;
pub use util::{
    basename, escape_html, is_valid_email, is_valid_url, unescape_html, url_encode, wikify,
};
