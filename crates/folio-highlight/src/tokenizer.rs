//! Source tokenization into categorized, line-grouped tokens.

use std::sync::Arc;

use syntect::easy::ScopeRegionIterator;
use syntect::parsing::{ParseState, Scope, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Category for text with no grammar match.
pub const PLAIN: &str = "plain";

/// A run of source text with its token category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub category: String,
}

impl Token {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }
}

/// Tokens of one source line, without the line terminator.
pub type Line = Vec<Token>;

/// Splits source text into categorized tokens, one group per source line.
///
/// Implementations must be pure: identical inputs yield identical output,
/// and an unknown language degrades to [`PlainTokenizer`] output.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, language: &str) -> Vec<Line>;
}

/// Tokenizer that assigns every line a single `plain` token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTokenizer;

impl Tokenizer for PlainTokenizer {
    fn tokenize(&self, text: &str, _language: &str) -> Vec<Line> {
        text.lines()
            .map(|line| {
                if line.is_empty() {
                    Vec::new()
                } else {
                    vec![Token::new(line, PLAIN)]
                }
            })
            .collect()
    }
}

/// Scope prefixes mapped to token categories, checked in order.
const SCOPE_RULES: &[(&str, &str)] = &[
    ("comment", "comment"),
    ("string.regexp", "regex"),
    ("string", "string"),
    ("constant.numeric", "number"),
    ("constant.language", "boolean"),
    ("constant.character.escape", "entity"),
    ("constant.character.entity", "entity"),
    ("keyword.operator", "operator"),
    ("keyword", "keyword"),
    ("storage", "keyword"),
    ("entity.name.function", "function"),
    ("support.function", "function"),
    ("variable.function", "function"),
    ("entity.name.tag", "tag"),
    ("entity.other.attribute-name", "attr-name"),
    ("entity.name.namespace", "namespace"),
    ("support.type.property-name", "property"),
    ("variable.other.property", "property"),
    ("variable.other.member", "property"),
    ("meta.property-name", "property"),
    ("support.type", "builtin"),
    ("support.class", "builtin"),
    ("support.constant", "builtin"),
    ("variable.language", "builtin"),
    ("variable.other.normal", "variable"),
    ("variable.other.bracket", "variable"),
    ("markup.underline.link", "url"),
    ("markup.inserted", "inserted"),
    ("markup.deleted", "deleted"),
    ("markup.bold", "bold"),
    ("markup.italic", "italic"),
    ("punctuation", "punctuation"),
];

/// Categories that claim everything nested inside them, delimiters included.
const CONTAINER_CATEGORIES: &[&str] = &["comment", "string", "regex"];

/// Tokenizer backed by syntect's bundled grammars.
#[derive(Clone)]
pub struct SyntectTokenizer {
    syntax_set: Arc<SyntaxSet>,
}

impl Default for SyntectTokenizer {
    fn default() -> Self {
        Self {
            syntax_set: Arc::new(SyntaxSet::load_defaults_newlines()),
        }
    }
}

impl SyntectTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the grammar for a fence language name.
    fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        let token = match language {
            "" => return None,
            "jsx" | "tsx" | "ts" | "typescript" | "javascript" | "mjs" | "cjs" => "js",
            "shell" | "zsh" | "console" => "bash",
            "rust" => "rs",
            other => other,
        };
        self.syntax_set.find_syntax_by_token(token)
    }

    fn tokenize_with(&self, text: &str, syntax: &SyntaxReference) -> Option<Vec<Line>> {
        let mut state = ParseState::new(syntax);
        let mut stack = ScopeStack::new();
        let mut lines = Vec::new();

        for line in LinesWithEndings::from(text) {
            let ops = state.parse_line(line, &self.syntax_set).ok()?;
            let mut tokens: Line = Vec::new();

            for (region, op) in ScopeRegionIterator::new(&ops, line) {
                stack.apply(op).ok()?;

                let region = region.trim_end_matches(['\n', '\r']);
                if region.is_empty() {
                    continue;
                }

                let category = categorize(stack.as_slice());
                match tokens.last_mut() {
                    Some(last) if last.category == category => last.text.push_str(region),
                    _ => tokens.push(Token::new(region, category)),
                }
            }

            lines.push(tokens);
        }

        Some(lines)
    }
}

impl Tokenizer for SyntectTokenizer {
    fn tokenize(&self, text: &str, language: &str) -> Vec<Line> {
        let Some(syntax) = self.find_syntax(language) else {
            tracing::debug!("No grammar for language '{}', using plain text", language);
            return PlainTokenizer.tokenize(text, language);
        };

        self.tokenize_with(text, syntax).unwrap_or_else(|| {
            tracing::debug!("Grammar for '{}' failed, using plain text", language);
            PlainTokenizer.tokenize(text, language)
        })
    }
}

/// Map a scope stack to a category, innermost scope first.
fn categorize(scopes: &[Scope]) -> &'static str {
    let mut found = None;

    for scope in scopes.iter().rev() {
        let name = scope.build_string();
        if let Some(category) = match_rule(&name) {
            if CONTAINER_CATEGORIES.contains(&category) {
                return category;
            }
            found.get_or_insert(category);
        }
    }

    found.unwrap_or(PLAIN)
}

fn match_rule(scope: &str) -> Option<&'static str> {
    SCOPE_RULES
        .iter()
        .find(|(prefix, _)| {
            scope == *prefix
                || (scope.starts_with(prefix) && scope[prefix.len()..].starts_with('.'))
        })
        .map(|(_, category)| *category)
}
