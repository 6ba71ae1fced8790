//! Markdown/MDX post parser with frontmatter and code block extraction.
//!
//! Parses a post source into its frontmatter, a table of contents, and a
//! compiled body where every fenced code block is kept as a typed
//! [`CodeBlock`] so renderers can dispatch on it without re-parsing.

pub mod codeblock;
pub mod frontmatter;
pub mod parser;

pub use codeblock::{CodeBlock, Snippet};
pub use frontmatter::{Frontmatter, FrontmatterError};
pub use parser::{parse_mdx, slugify, BodySegment, CompiledBody, ParseError, ParsedDoc, TocEntry};
