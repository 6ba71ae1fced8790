//! Post document parser.

use std::collections::HashMap;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::codeblock::CodeBlock;
use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// Average reading speed used for the time-to-read estimate.
const WORDS_PER_MINUTE: f64 = 265.0;

/// Maximum excerpt length in characters.
const EXCERPT_LENGTH: usize = 140;

/// A parsed post document.
#[derive(Debug, Clone)]
pub struct ParsedDoc {
    /// Parsed frontmatter (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Markdown content (without frontmatter)
    pub content: String,

    /// Body compiled to HTML with code blocks kept aside
    pub body: CompiledBody,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,

    /// Words of prose, code excluded
    pub word_count: usize,

    /// Estimated reading time in minutes (at least 1)
    pub time_to_read: u32,

    /// Plain-text summary of the opening prose
    pub excerpt: String,
}

impl ParsedDoc {
    /// All code blocks in document order.
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.body.code_blocks()
    }
}

/// One piece of a compiled body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySegment {
    /// Pre-rendered HTML
    Html(String),
    /// A fenced code block, rendered by the caller
    Code(CodeBlock),
}

/// A post body compiled once at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledBody {
    pub segments: Vec<BodySegment>,
}

impl CompiledBody {
    /// All code blocks in document order.
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.segments.iter().filter_map(|segment| match segment {
            BodySegment::Code(block) => Some(block),
            BodySegment::Html(_) => None,
        })
    }
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a post.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// In-progress fenced block: (info, start line, collected text).
type OpenBlock = (String, usize, String);

/// In-progress heading: (level, text, inner events).
type OpenHeading<'a> = (u8, String, Vec<Event<'a>>);

/// Parse a post document.
///
/// Extracts frontmatter, compiles the body, and generates a table of contents.
pub fn parse_mdx(source: &str) -> Result<ParsedDoc, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    // content is a suffix of source
    let line_offset = source[..source.len() - content.len()].matches('\n').count();

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(content, options).into_offset_iter();

    let mut segments = Vec::new();
    let mut pending: Vec<Event> = Vec::new();
    let mut toc = Vec::new();
    let mut slug_counts: HashMap<String, usize> = HashMap::new();
    let mut footnotes: HashMap<String, usize> = HashMap::new();
    let mut prose = String::new();

    let mut current_block: Option<OpenBlock> = None;
    let mut current_heading: Option<OpenHeading> = None;

    for (event, range) in parser {
        let event = number_footnote(event, &mut footnotes);

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match &kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                let line = line_offset + content[..range.start].matches('\n').count() + 1;
                current_block = Some((info, line, String::new()));
            }

            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, line, text)) = current_block.take() {
                    flush_html(&mut pending, &mut segments);
                    segments.push(BodySegment::Code(CodeBlock::from_fence(&info, text, line)));
                }
            }

            Event::Text(text) if current_block.is_some() => {
                if let Some((_, _, ref mut buf)) = current_block {
                    buf.push_str(&text);
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((level as u8, String::new(), Vec::new()));
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title, inner)) = current_heading.take() {
                    let id = unique_slug(&title, &mut slug_counts);

                    pending.push(Event::Html(CowStr::from(format!(
                        "<h{level} id=\"{id}\"><a class=\"anchor\" href=\"#{id}\" aria-hidden=\"true\">#</a>"
                    ))));
                    pending.extend(inner);
                    pending.push(Event::Html(CowStr::from(format!("</h{level}>\n"))));

                    push_prose(&mut prose, &title);
                    toc.push(TocEntry { title, id, level });
                }
            }

            event => {
                if let Event::Text(text) | Event::Code(text) = &event {
                    match current_heading {
                        Some((_, ref mut title, _)) => title.push_str(text),
                        None => push_prose(&mut prose, text),
                    }
                }

                match current_heading {
                    Some((_, _, ref mut inner)) => inner.push(event),
                    None => pending.push(event),
                }
            }
        }
    }

    flush_html(&mut pending, &mut segments);

    let word_count = prose.split_whitespace().count();

    Ok(ParsedDoc {
        frontmatter,
        content: content.to_string(),
        body: CompiledBody { segments },
        toc,
        word_count,
        time_to_read: time_to_read(word_count),
        excerpt: excerpt(&prose),
    })
}

/// Render buffered events into an HTML segment.
fn flush_html(pending: &mut Vec<Event>, segments: &mut Vec<BodySegment>) {
    if pending.is_empty() {
        return;
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, pending.drain(..));
    segments.push(BodySegment::Html(html_output));
}

/// Replace footnote events with pre-rendered HTML.
///
/// The body is rendered in several segments, so numbering is tracked across
/// the whole document here instead of per segment.
fn number_footnote<'a>(event: Event<'a>, footnotes: &mut HashMap<String, usize>) -> Event<'a> {
    let mut number = |name: &str| {
        let next = footnotes.len() + 1;
        *footnotes.entry(name.to_string()).or_insert(next)
    };

    match event {
        Event::FootnoteReference(name) => {
            let n = number(&name);
            let id = escape_attr(&name);
            Event::Html(CowStr::from(format!(
                "<sup class=\"footnote-reference\"><a href=\"#fn-{id}\">{n}</a></sup>"
            )))
        }
        Event::Start(Tag::FootnoteDefinition(name)) => {
            let n = number(&name);
            let id = escape_attr(&name);
            Event::Html(CowStr::from(format!(
                "<div class=\"footnote-definition\" id=\"fn-{id}\"><sup class=\"footnote-definition-label\">{n}</sup>\n"
            )))
        }
        Event::End(TagEnd::FootnoteDefinition) => Event::Html(CowStr::from("</div>\n")),
        event => event,
    }
}

fn escape_attr(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn push_prose(prose: &mut String, text: &str) {
    if !prose.is_empty() {
        prose.push(' ');
    }
    prose.push_str(text);
}

/// Reading time in whole minutes, never below one.
fn time_to_read(words: usize) -> u32 {
    ((words as f64 / WORDS_PER_MINUTE).round() as u32).max(1)
}

/// First sentence-ish slice of prose with whitespace collapsed.
fn excerpt(prose: &str) -> String {
    let collapsed = prose.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= EXCERPT_LENGTH {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(EXCERPT_LENGTH).collect();
    format!("{}…", cut.trim_end())
}

/// Slug a heading, suffixing repeats with `-1`, `-2`, ...
fn unique_slug(title: &str, counts: &mut HashMap<String, usize>) -> String {
    let base = slugify(title);
    let seen = counts.entry(base.clone()).or_insert(0);
    let slug = if *seen == 0 {
        base
    } else {
        format!("{}-{}", base, seen)
    };
    *seen += 1;
    slug
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
