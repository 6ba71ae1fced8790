//! Syntax highlighting and live panel markup for post code blocks.
//!
//! Static blocks are tokenized, each token category is mapped through the
//! [`Theme`] style table, and the result is emitted as line-grouped spans.
//! Live blocks become an editor / error / preview panel that the runtime
//! script wires to an evaluator.

pub mod render;
pub mod theme;
pub mod tokenizer;

pub use render::{escape_html, CodeRenderer};
pub use theme::{Decoration, Theme, ThemeColors, TokenStyle};
pub use tokenizer::{Line, PlainTokenizer, SyntectTokenizer, Token, Tokenizer, PLAIN};
