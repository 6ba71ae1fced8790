//! Static site builder.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use folio_highlight::{CodeRenderer, Theme, ThemeColors};

use crate::assets::AssetPipeline;
use crate::content::{ContentError, ContentGraph};
use crate::page::{PageRenderer, SiteInfo, DEFAULT_DATE_FORMAT};

/// Page directories written by the last build, one per line, relative to the
/// output directory.
const PAGE_MANIFEST: &str = ".folio-pages";

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source posts directory
    pub content_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Minify CSS output
    pub minify: bool,

    /// Path prefix for links
    pub base_url: String,

    /// Absolute origin for canonical URLs and the sitemap
    pub site_url: String,

    /// Site title
    pub title: String,

    pub description: String,

    pub author: Option<String>,

    /// chrono format for displayed dates
    pub date_format: String,

    pub theme: ThemeColors,

    /// Languages with a configured evaluator
    pub live_languages: Vec<String>,

    /// Include the hot reload client in pages
    pub dev: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("posts"),
            output_dir: PathBuf::from("dist"),
            minify: true,
            base_url: "/".to_string(),
            site_url: "http://localhost".to_string(),
            title: "Blog".to_string(),
            description: String::new(),
            author: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            theme: ThemeColors::default(),
            live_languages: vec![],
            dev: false,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of posts published
    pub posts: usize,

    /// Number of series pages
    pub series: usize,

    /// Number of HTML pages written
    pub pages: usize,

    /// Pages from the previous build that were removed
    pub removed: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Failed to render template: {0}")]
    TemplateError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
    theme: Arc<Theme>,
    renderer: PageRenderer,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        let theme = Arc::new(Theme::new(config.theme.clone()));
        let code = CodeRenderer::new(Arc::clone(&theme))
            .with_live_languages(config.live_languages.iter().cloned());

        let base_url = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        let site = SiteInfo {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            site_url: config.site_url.clone(),
            base_url,
            date_format: config.date_format.clone(),
            dev: config.dev,
        };

        Self {
            renderer: PageRenderer::new(site, code),
            theme,
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let graph = ContentGraph::load(&self.config.content_dir)?;
        tracing::debug!(
            "Loaded {} posts from {}",
            graph.len(),
            self.config.content_dir.display()
        );

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        // Render post pages in parallel
        graph
            .posts()
            .par_iter()
            .map(|post| {
                let html = self
                    .renderer
                    .render_post(post, &graph)
                    .map_err(|e| BuildError::TemplateError(format!("{}: {}", post.slug, e)))?;
                self.write_page(&self.config.output_dir.join(&post.slug), html)
            })
            .collect::<Result<Vec<()>, BuildError>>()?;

        let series = graph.series();
        series
            .par_iter()
            .map(|s| {
                let html = self
                    .renderer
                    .render_series(s)
                    .map_err(|e| BuildError::TemplateError(format!("series {}: {}", s.slug, e)))?;
                self.write_page(&self.config.output_dir.join("series").join(&s.slug), html)
            })
            .collect::<Result<Vec<()>, BuildError>>()?;

        let index = self
            .renderer
            .render_index(&graph)
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;
        self.write_page(&self.config.output_dir, index)?;

        let pages: BTreeSet<String> = graph
            .posts()
            .iter()
            .map(|p| p.slug.clone())
            .chain(series.iter().map(|s| format!("series/{}", s.slug)))
            .collect();
        let removed = self.remove_stale_pages(&pages)?;
        if removed > 0 {
            tracing::info!("Removed {} stale pages", removed);
        }

        self.generate_assets()?;

        let mut paths = vec![self.renderer.site().base_url.clone()];
        paths.extend(graph.posts().iter().map(|p| self.renderer.post_path(&p.slug)));
        paths.extend(series.iter().map(|s| self.renderer.series_path(&s.name)));
        self.generate_sitemap(&paths)?;

        let duration = start.elapsed();

        Ok(BuildResult {
            posts: graph.len(),
            series: series.len(),
            pages: graph.len() + series.len() + 1,
            removed,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Write `html` to `dir/index.html`.
    fn write_page(&self, dir: &Path, html: String) -> Result<(), BuildError> {
        fs::create_dir_all(dir).map_err(|e| BuildError::WriteError(e.to_string()))?;
        fs::write(dir.join("index.html"), html)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", dir.display(), e)))
    }

    /// Delete pages listed in the previous manifest that this build no longer
    /// produces, then record `pages` as the new manifest.
    fn remove_stale_pages(&self, pages: &BTreeSet<String>) -> Result<usize, BuildError> {
        let output = &self.config.output_dir;
        let manifest = output.join(PAGE_MANIFEST);

        let previous = match fs::read_to_string(&manifest) {
            Ok(previous) => previous,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(BuildError::WriteError(format!("{}: {}", manifest.display(), e))),
        };

        let mut removed = 0;
        for page in previous.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if pages.contains(page) {
                continue;
            }

            let rel = Path::new(page);
            if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                tracing::warn!("Ignoring manifest entry {:?}", page);
                continue;
            }

            let dir = output.join(rel);
            match fs::remove_file(dir.join("index.html")) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::WriteError(format!("{}: {}", dir.display(), e))),
            }

            // Prune now-empty directories up to the output root.
            let mut dir = Some(dir.as_path());
            while let Some(d) = dir.filter(|d| *d != output.as_path()) {
                if fs::remove_dir(d).is_err() {
                    break;
                }
                dir = d.parent();
            }
        }

        let listing: Vec<&str> = pages.iter().map(String::as_str).collect();
        fs::write(&manifest, listing.join("\n"))
            .map_err(|e| BuildError::WriteError(format!("{}: {}", manifest.display(), e)))?;

        Ok(removed)
    }

    /// Generate static assets.
    fn generate_assets(&self) -> Result<(), BuildError> {
        let assets_dir = self.config.output_dir.join("assets");
        fs::create_dir_all(&assets_dir).map_err(|e| BuildError::WriteError(e.to_string()))?;

        let css = AssetPipeline::generate_css(&self.theme);
        let css = if self.config.minify {
            AssetPipeline::minify_css(&css).unwrap_or_else(|e| {
                tracing::warn!("{}, writing unminified CSS", e);
                css
            })
        } else {
            css
        };
        fs::write(assets_dir.join("main.css"), css)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        fs::write(assets_dir.join("main.js"), AssetPipeline::generate_js())
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Generate sitemap and robots.txt.
    fn generate_sitemap(&self, paths: &[String]) -> Result<(), BuildError> {
        let urls: Vec<String> = paths
            .iter()
            .map(|path| {
                format!(
                    "  <url>\n    <loc>{}</loc>\n  </url>",
                    folio_highlight::escape_html(&self.renderer.absolute_url(path))
                )
            })
            .collect();

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>"#,
            urls.join("\n")
        );

        fs::write(self.config.output_dir.join("sitemap.xml"), sitemap)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let robots = format!(
            "User-agent: *\nAllow: /\nSitemap: {}",
            self.renderer.absolute_url(&format!(
                "{}sitemap.xml",
                self.renderer.site().base_url
            ))
        );
        fs::write(self.config.output_dir.join("robots.txt"), robots)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(())
    }
}
