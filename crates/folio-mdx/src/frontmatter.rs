//! Frontmatter extraction and parsing.

use serde::Deserialize;

/// Parsed frontmatter from a post.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Frontmatter {
    /// Post title (required)
    pub title: String,

    /// Publication date, `YYYY-MM-DD` or RFC 3339 (required)
    pub date: String,

    /// Series this post belongs to, in display casing
    #[serde(default)]
    pub series: Vec<String>,

    /// External link the post replies to
    #[serde(default)]
    pub link: Option<String>,

    /// Page description for SEO
    #[serde(default)]
    pub description: Option<String>,

    /// Custom slug override
    #[serde(default)]
    pub slug: Option<String>,

    /// Drafts are parsed but never published
    #[serde(default)]
    pub draft: bool,
}

/// Extract frontmatter from post content.
///
/// Returns the parsed frontmatter and the remaining content after the frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    let frontmatter: Frontmatter = serde_yaml::from_str(yaml_content)
        .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

    Ok((Some(frontmatter), remaining.trim_start()))
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_valid_frontmatter() {
        let source = r#"---
title: Closures in Practice
date: 2019-03-02
series:
  - Deep Dives
  - JavaScript
link: https://example.com/original
---

# Closures
"#;

        let (fm, content) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.title, "Closures in Practice");
        assert_eq!(fm.date, "2019-03-02");
        assert_eq!(fm.series, vec!["Deep Dives", "JavaScript"]);
        assert_eq!(fm.link.as_deref(), Some("https://example.com/original"));
        assert!(!fm.draft);
        assert!(content.starts_with("# Closures"));
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let source = "---\ntitle: Short\ndate: 2020-01-01\n---\nBody";

        let (fm, _) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert!(fm.series.is_empty());
        assert_eq!(fm.link, None);
        assert_eq!(fm.slug, None);
    }

    #[test]
    fn handles_no_frontmatter() {
        let source = "# Just Markdown\n\nNo frontmatter here.";

        let (fm, content) = extract_frontmatter(source).unwrap();

        assert!(fm.is_none());
        assert_eq!(content, source);
    }

    #[test]
    fn errors_on_unclosed_frontmatter() {
        let source = "---\ntitle: Test\n# No closing";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::Unclosed)));
    }

    #[test]
    fn errors_on_missing_date() {
        let source = "---\ntitle: Test\n---\n";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::InvalidYaml(_))));
    }
}
