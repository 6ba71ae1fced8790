//! `blog.toml` configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use folio_highlight::ThemeColors;
use folio_static::{BuildConfig, DEFAULT_DATE_FORMAT};

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub site: SiteConfig,
    pub content: ContentConfig,
    pub build: BuildSettings,
    pub theme: ThemeColors,
    pub live: LiveConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    /// Public origin, e.g. `https://sean.wtf`
    pub url: String,
    pub base_url: String,
    pub description: String,
    pub author: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Blog".to_string(),
            url: "http://localhost".to_string(),
            base_url: "/".to_string(),
            description: String::new(),
            author: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub dir: PathBuf,
    pub output: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("posts"),
            output: PathBuf::from("dist"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub minify: bool,
    pub date_format: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LiveConfig {
    /// Evaluate each panel's seed once when the page opens
    pub evaluate_on_mount: bool,
    /// Language -> command line; the source is written to its stdin
    pub evaluators: BTreeMap<String, Vec<String>>,
}

impl ConfigFile {
    /// Load configuration, falling back to defaults when the file is absent.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build settings for the static builder.
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            content_dir: self.content.dir.clone(),
            output_dir: self.content.output.clone(),
            minify: self.build.minify,
            base_url: self.site.base_url.clone(),
            site_url: self.site.url.clone(),
            title: self.site.title.clone(),
            description: self.site.description.clone(),
            author: self.site.author.clone(),
            date_format: self.build.date_format.clone(),
            theme: self.theme.clone(),
            live_languages: self
                .live
                .evaluators
                .iter()
                .filter(|(_, argv)| !argv.is_empty())
                .map(|(language, _)| language.to_lowercase())
                .collect(),
            dev: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_config() {
        let config = ConfigFile::parse(
            r##"
[site]
title = "sean.wtf"
url = "https://sean.wtf"

[build]
date_format = "%B %d, %Y"

[theme]
primary = "#000"

[live]
evaluate_on_mount = true

[live.evaluators]
JS = ["node", "-"]
empty = []
"##,
        )
        .unwrap();

        let build = config.build_config();

        assert_eq!(build.title, "sean.wtf");
        assert_eq!(build.site_url, "https://sean.wtf");
        assert_eq!(build.base_url, "/");
        assert_eq!(build.date_format, "%B %d, %Y");
        assert_eq!(build.theme.primary, "#000");
        assert_eq!(build.theme.bg, ThemeColors::default().bg);
        assert_eq!(build.live_languages, vec!["js".to_string()]);
        assert!(config.live.evaluate_on_mount);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = ConfigFile::load(Path::new("does/not/exist.toml")).unwrap();

        assert_eq!(config.content.dir, PathBuf::from("posts"));
        assert!(config.build.minify);
        assert!(config.live.evaluators.is_empty());
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(ConfigFile::parse("[site\ntitle = 1").is_err());
    }
}
