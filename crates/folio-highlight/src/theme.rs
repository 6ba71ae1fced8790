//! Site theme and the token style table.

use std::collections::HashMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Theme colors, configurable under `[theme]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    /// Accent color for links, rules and comment highlights
    pub primary: String,
    /// Page background, also used as text on accent backgrounds
    pub bg: String,
    /// Code block background
    pub background: String,
    /// Body text color
    pub text: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#b5452b".to_string(),
            bg: "#fffdf8".to_string(),
            background: "#f6f1e7".to_string(),
            text: "#2d2a26".to_string(),
        }
    }
}

/// Text decoration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoration {
    Underline,
    LineThrough,
}

impl Decoration {
    fn as_css(self) -> &'static str {
        match self {
            Self::Underline => "underline",
            Self::LineThrough => "line-through",
        }
    }
}

/// Visual style of a token category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStyle {
    pub bold: bool,
    pub italic: bool,
    pub decoration: Option<Decoration>,
    pub opacity: Option<f32>,
    pub color: Option<String>,
    pub background: Option<String>,
}

impl TokenStyle {
    /// Inline CSS declarations, empty for the default style.
    pub fn to_css(&self) -> String {
        let mut css = String::new();

        if let Some(color) = &self.color {
            let _ = write!(css, "color:{};", color);
        }
        if let Some(background) = &self.background {
            let _ = write!(css, "background-color:{};", background);
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        if self.italic {
            css.push_str("font-style:italic;");
        }
        if let Some(decoration) = self.decoration {
            let _ = write!(css, "text-decoration-line:{};", decoration.as_css());
        }
        if let Some(opacity) = self.opacity {
            let _ = write!(css, "opacity:{};", opacity);
        }

        css
    }

    fn apply(&mut self, rule: &StyleRule, colors: &ThemeColors) {
        self.bold |= rule.bold;
        self.italic |= rule.italic;
        if rule.decoration.is_some() {
            self.decoration = rule.decoration;
        }
        if rule.opacity.is_some() {
            self.opacity = rule.opacity;
        }
        if let Some(color) = rule.color {
            self.color = Some(color.resolve(colors).to_string());
        }
        if let Some(background) = rule.background {
            self.background = Some(background.resolve(colors).to_string());
        }
    }
}

#[derive(Clone, Copy)]
enum ThemeColor {
    Primary,
    Bg,
}

impl ThemeColor {
    fn resolve(self, colors: &ThemeColors) -> &str {
        match self {
            Self::Primary => &colors.primary,
            Self::Bg => &colors.bg,
        }
    }
}

struct StyleRule {
    types: &'static [&'static str],
    bold: bool,
    italic: bool,
    decoration: Option<Decoration>,
    opacity: Option<f32>,
    color: Option<ThemeColor>,
    background: Option<ThemeColor>,
}

const NONE: StyleRule = StyleRule {
    types: &[],
    bold: false,
    italic: false,
    decoration: None,
    opacity: None,
    color: None,
    background: None,
};

// A category listed by several rules accumulates all of them, later rules
// overriding earlier values.
const RULES: &[StyleRule] = &[
    StyleRule {
        types: &["atom"],
        bold: true,
        ..NONE
    },
    StyleRule {
        types: &["prolog", "doctype", "cdata", "punctuation"],
        opacity: Some(0.7),
        ..NONE
    },
    StyleRule {
        types: &["comment"],
        opacity: Some(0.7),
        color: Some(ThemeColor::Bg),
        background: Some(ThemeColor::Primary),
        bold: true,
        decoration: Some(Decoration::Underline),
        ..NONE
    },
    StyleRule {
        types: &["namespace"],
        opacity: Some(0.7),
        ..NONE
    },
    StyleRule {
        types: &["tag", "operator", "number"],
        opacity: Some(0.7),
        ..NONE
    },
    StyleRule {
        types: &["property", "function"],
        bold: true,
        opacity: Some(0.7),
        ..NONE
    },
    StyleRule {
        types: &[
            "boolean",
            "string",
            "entity",
            "url",
            "attr-value",
            "control",
            "directive",
            "unit",
            "statement",
            "regex",
            "at-rule",
        ],
        bold: true,
        ..NONE
    },
    StyleRule {
        types: &["placeholder", "variable", "builtin", "keyword"],
        italic: true,
        ..NONE
    },
    StyleRule {
        types: &["keyword"],
        opacity: Some(0.7),
        ..NONE
    },
    StyleRule {
        types: &["deleted"],
        decoration: Some(Decoration::LineThrough),
        ..NONE
    },
    StyleRule {
        types: &["inserted"],
        decoration: Some(Decoration::Underline),
        ..NONE
    },
    StyleRule {
        types: &["italic"],
        italic: true,
        ..NONE
    },
    StyleRule {
        types: &["important", "bold"],
        bold: true,
        ..NONE
    },
];

/// Immutable site theme: colors plus the resolved token style table.
///
/// Built once at startup and shared by reference with the code renderer,
/// the page templates and the stylesheet generator.
#[derive(Debug, Clone)]
pub struct Theme {
    colors: ThemeColors,
    styles: HashMap<&'static str, TokenStyle>,
    default_style: TokenStyle,
}

impl Theme {
    pub fn new(colors: ThemeColors) -> Self {
        let mut styles: HashMap<&'static str, TokenStyle> = HashMap::new();

        for rule in RULES {
            for category in rule.types {
                styles.entry(*category).or_default().apply(rule, &colors);
            }
        }

        Self {
            colors,
            styles,
            default_style: TokenStyle::default(),
        }
    }

    pub fn colors(&self) -> &ThemeColors {
        &self.colors
    }

    /// Style for a token category; unknown categories get the default style.
    pub fn style_for(&self, category: &str) -> &TokenStyle {
        self.styles.get(category).unwrap_or(&self.default_style)
    }

    /// Inline CSS for the code block container.
    pub fn code_block_css(&self) -> String {
        format!("background-color:{};", self.colors.background)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(ThemeColors::default())
    }
}
