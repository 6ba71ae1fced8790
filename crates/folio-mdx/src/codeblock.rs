//! Code block extraction and parsing.

/// Fence annotations that mark a block as live-editable.
const LIVE_MARKERS: &[&str] = &["live", "react-live"];

/// The content of a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// Unique identifier for this block (format: block-{line_number})
    pub id: String,

    /// Lowercased language name from the info string, empty when absent
    pub language: String,

    /// Source code content
    pub source: String,

    /// Line number where the block starts (1-indexed)
    pub line_number: usize,

    /// Optional filename hint from info string
    pub filename: Option<String>,
}

/// A fenced code block, either displayed as-is or mounted as a live panel.
///
/// The variant is decided once from the fence annotation and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeBlock {
    /// Syntax highlight only
    Static(Snippet),
    /// Editable panel with error and preview regions
    Live(Snippet),
}

impl CodeBlock {
    /// Build a code block from a fence info string and its content.
    pub fn from_fence(info: &str, source: String, line_number: usize) -> Self {
        let snippet = Snippet {
            id: format!("block-{}", line_number),
            language: language_from_info(info),
            source,
            line_number,
            filename: extract_filename(info),
        };

        if is_live_info(info) {
            Self::Live(snippet)
        } else {
            Self::Static(snippet)
        }
    }

    /// The block content regardless of variant.
    pub fn snippet(&self) -> &Snippet {
        match self {
            Self::Static(s) | Self::Live(s) => s,
        }
    }

    /// Check if this block was annotated as live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Convert into a static block, keeping the content.
    pub fn into_static(self) -> Self {
        match self {
            Self::Live(s) => Self::Static(s),
            other => other,
        }
    }
}

/// Parse the language from a code fence info string.
pub fn language_from_info(info: &str) -> String {
    info.split_whitespace()
        .next()
        .filter(|lang| !lang.contains('='))
        .map(|lang| lang.to_lowercase())
        .unwrap_or_default()
}

/// Check whether the info string carries a live marker after the language.
fn is_live_info(info: &str) -> bool {
    info.split_whitespace()
        .skip(1)
        .any(|word| LIVE_MARKERS.contains(&word.to_lowercase().as_str()))
}

/// Extract filename from code fence info string if present.
///
/// Supports formats like:
/// - `js filename="counter.js"`
/// - `js file=counter.js`
pub fn extract_filename(info: &str) -> Option<String> {
    if let Some(start) = info.find("filename=\"") {
        let rest = &info[start + 10..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    if let Some(start) = info.find("file=") {
        let rest = &info[start + 5..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let filename = rest[..end].trim_matches('"');
        if !filename.is_empty() {
            return Some(filename.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language() {
        assert_eq!(language_from_info("jsx react-live"), "jsx");
        assert_eq!(language_from_info("Rust"), "rust");
        assert_eq!(language_from_info(""), "");
        assert_eq!(language_from_info("file=a.js"), "");
    }

    #[test]
    fn detects_live_annotation() {
        assert!(CodeBlock::from_fence("jsx react-live", String::new(), 1).is_live());
        assert!(CodeBlock::from_fence("js live", String::new(), 1).is_live());
        assert!(!CodeBlock::from_fence("js", String::new(), 1).is_live());
        // the language itself is never the marker
        assert!(!CodeBlock::from_fence("live", String::new(), 1).is_live());
    }

    #[test]
    fn extracts_filename() {
        assert_eq!(
            extract_filename("js filename=\"counter.js\""),
            Some("counter.js".to_string())
        );
        assert_eq!(
            extract_filename("js file=counter.js live"),
            Some("counter.js".to_string())
        );
        assert_eq!(extract_filename("js live"), None);
    }

    #[test]
    fn downgrades_to_static() {
        let block = CodeBlock::from_fence("js live", "1".to_string(), 7);
        let id = block.snippet().id.clone();

        let downgraded = block.into_static();

        assert!(!downgraded.is_live());
        assert_eq!(downgraded.snippet().id, id);
        assert_eq!(id, "block-7");
    }
}
