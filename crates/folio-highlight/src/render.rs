//! Code block HTML rendering.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

use folio_mdx::{CodeBlock, Snippet};

use crate::theme::Theme;
use crate::tokenizer::{SyntectTokenizer, Tokenizer};

/// Renders fenced code blocks as highlighted `<pre>` blocks or live panels.
pub struct CodeRenderer<T: Tokenizer = SyntectTokenizer> {
    theme: Arc<Theme>,
    tokenizer: T,
    live_languages: HashSet<String>,
}

impl CodeRenderer<SyntectTokenizer> {
    /// Create a renderer with syntect grammars and no live languages.
    pub fn new(theme: Arc<Theme>) -> Self {
        Self::with_tokenizer(theme, SyntectTokenizer::new())
    }
}

impl<T: Tokenizer> CodeRenderer<T> {
    pub fn with_tokenizer(theme: Arc<Theme>, tokenizer: T) -> Self {
        Self {
            theme,
            tokenizer,
            live_languages: HashSet::new(),
        }
    }

    /// Languages that have an evaluator; live blocks in any other language
    /// render statically.
    pub fn with_live_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.live_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Render a code block to HTML.
    pub fn render(&self, block: &CodeBlock) -> String {
        match block {
            CodeBlock::Static(snippet) => self.render_static(snippet),
            CodeBlock::Live(snippet) if self.live_languages.contains(&snippet.language) => {
                self.render_live(snippet)
            }
            CodeBlock::Live(snippet) => {
                tracing::debug!(
                    "No evaluator for '{}', rendering {} statically",
                    snippet.language,
                    snippet.id
                );
                self.render_static(snippet)
            }
        }
    }

    /// Highlighted, line-grouped spans.
    pub fn render_static(&self, snippet: &Snippet) -> String {
        let lines = self.tokenizer.tokenize(&snippet.source, &snippet.language);

        let mut html = format!(
            r#"<pre class="prism-code{}" style="{}">"#,
            language_class(&snippet.language),
            self.theme.code_block_css()
        );

        for line in lines {
            html.push_str(r#"<div class="token-line">"#);
            if line.is_empty() {
                html.push('\n');
            }
            for token in line {
                let css = self.theme.style_for(&token.category).to_css();
                let _ = write!(html, r#"<span class="token {}""#, token.category);
                if !css.is_empty() {
                    let _ = write!(html, r#" style="{}""#, css);
                }
                let _ = write!(html, ">{}</span>", escape_html(&token.text));
            }
            html.push_str("</div>");
        }

        html.push_str("</pre>");
        html
    }

    /// Editor, error and preview regions seeded with the block source.
    ///
    /// The source is evaluated as written; it is never wrapped as a single
    /// expression.
    pub fn render_live(&self, snippet: &Snippet) -> String {
        let rows = snippet.source.lines().count().max(1);

        format!(
            concat!(
                r#"<div class="live-panel" data-live-id="{id}" data-language="{lang}" data-no-inline="true">"#,
                r#"<textarea class="live-editor{class}" rows="{rows}" spellcheck="false" style="{style}">{source}</textarea>"#,
                r#"<pre class="live-error" hidden></pre>"#,
                r#"<div class="live-preview"></div>"#,
                "</div>"
            ),
            id = escape_html(&snippet.id),
            lang = escape_html(&snippet.language),
            class = language_class(&snippet.language),
            rows = rows,
            style = self.theme.code_block_css(),
            source = escape_html(&snippet.source),
        )
    }
}

fn language_class(language: &str) -> String {
    if language.is_empty() {
        String::new()
    } else {
        format!(" language-{}", escape_html(language))
    }
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
