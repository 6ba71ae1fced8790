//! Projection of content records onto page templates.

use std::fmt::Write;

use chrono::NaiveDate;

use folio_highlight::{escape_html, CodeRenderer, SyntectTokenizer, Tokenizer};
use folio_mdx::{BodySegment, CompiledBody};

use crate::content::{kebab_case, ContentGraph, PostRecord, Series};
use crate::templates::{
    Link, ListContext, ListEntry, PostContext, PostView, Seo, SiteContext, TemplateEngine,
    TocItem,
};

/// Date format used when the configured one cannot be rendered.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Site identity and URL settings for rendered pages.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    /// Site identifier used in page titles
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    /// Absolute origin for canonical URLs, e.g. `https://sean.wtf`
    pub site_url: String,
    /// Path prefix for links, ending in `/`
    pub base_url: String,
    /// chrono format string for displayed dates
    pub date_format: String,
    /// Include the hot reload client
    pub dev: bool,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Blog".to_string(),
            description: String::new(),
            author: None,
            site_url: "http://localhost".to_string(),
            base_url: "/".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            dev: false,
        }
    }
}

/// Renders posts, series pages and the index.
pub struct PageRenderer<T: Tokenizer = SyntectTokenizer> {
    site: SiteInfo,
    code: CodeRenderer<T>,
    templates: TemplateEngine,
}

impl<T: Tokenizer> PageRenderer<T> {
    pub fn new(site: SiteInfo, code: CodeRenderer<T>) -> Self {
        Self {
            site,
            code,
            templates: TemplateEngine::new(),
        }
    }

    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    /// Path of a post page.
    pub fn post_path(&self, slug: &str) -> String {
        format!("{}{}", self.site.base_url, slug)
    }

    /// Path of a series index. Always derived from the kebab-cased name.
    pub fn series_path(&self, name: &str) -> String {
        format!("{}series/{}", self.site.base_url, kebab_case(name))
    }

    /// Render a compiled body, dispatching each code block to the code renderer.
    pub fn render_body(&self, body: &CompiledBody) -> String {
        let mut html = String::new();

        for segment in &body.segments {
            match segment {
                BodySegment::Html(fragment) => html.push_str(fragment),
                BodySegment::Code(block) => {
                    html.push_str(&self.code.render(block));
                    html.push('\n');
                }
            }
        }

        html
    }

    /// Render a post page.
    ///
    /// Neighbors are looked up in `graph`; a neighbor that cannot be resolved
    /// is left out of the navigation.
    pub fn render_post(
        &self,
        post: &PostRecord,
        graph: &ContentGraph,
    ) -> Result<String, minijinja::Error> {
        let href = self.post_path(&post.slug);
        let description = post
            .description
            .clone()
            .unwrap_or_else(|| post.excerpt.clone());
        let canonical = self.absolute_url(&href);

        let mut json_ld = serde_json::json!({
            "@context": "https://schema.org",
            "@type": "BlogPosting",
            "headline": post.title,
            "description": description,
            "datePublished": post.date.to_string(),
            "url": canonical,
        });
        if let Some(author) = &self.site.author {
            json_ld["author"] = serde_json::json!({ "@type": "Person", "name": author });
        }

        let context = PostContext {
            site: self.site_context(),
            page_title: format!("{} · {}", self.site.title, post.title),
            seo: Seo {
                title: post.title.clone(),
                description,
                canonical: escape_html(&canonical),
                og_type: "article".to_string(),
                published: Some(post.date.to_string()),
                json_ld: Some(script_safe(&json_ld.to_string())),
            },
            post: PostView {
                title: post.title.clone(),
                href: escape_html(&href),
                date: escape_html(&self.format_date(post.date)),
                iso_date: post.date.to_string(),
                time_to_read: post.time_to_read,
                link: post.link.as_deref().map(escape_html),
                series: self.series_links(&post.series),
                toc: post
                    .toc
                    .iter()
                    .map(|entry| TocItem {
                        title: entry.title.clone(),
                        href: escape_html(&format!("#{}", entry.id)),
                        level: entry.level,
                    })
                    .collect(),
                body: self.render_body(&post.body),
            },
            prev: self.neighbor(post.prev.as_deref(), graph),
            next: self.neighbor(post.next.as_deref(), graph),
        };

        self.templates.render_page("post.html", &context)
    }

    /// Render the home page listing every post.
    pub fn render_index(&self, graph: &ContentGraph) -> Result<String, minijinja::Error> {
        let entries = graph.posts().iter().map(|p| self.list_entry(p)).collect();

        let context = ListContext {
            site: self.site_context(),
            page_title: self.site.title.clone(),
            seo: self.listing_seo(&self.site.title, &self.site.base_url),
            heading: "Posts".to_string(),
            entries,
        };

        self.templates.render_page("list.html", &context)
    }

    /// Render the index page of one series.
    pub fn render_series(&self, series: &Series<'_>) -> Result<String, minijinja::Error> {
        let entries = series.posts.iter().map(|p| self.list_entry(p)).collect();
        let path = self.series_path(&series.name);

        let context = ListContext {
            site: self.site_context(),
            page_title: format!("{} · #{}", self.site.title, series.name),
            seo: self.listing_seo(&format!("#{}", series.name), &path),
            heading: format!("#{}", series.name),
            entries,
        };

        self.templates.render_page("list.html", &context)
    }

    /// Absolute URL for a site path.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site.site_url.trim_end_matches('/'), path)
    }

    fn site_context(&self) -> SiteContext {
        SiteContext {
            title: self.site.title.clone(),
            base_url: escape_html(&self.site.base_url),
            dev: self.site.dev,
        }
    }

    fn listing_seo(&self, title: &str, path: &str) -> Seo {
        Seo {
            title: title.to_string(),
            description: self.site.description.clone(),
            canonical: escape_html(&self.absolute_url(path)),
            og_type: "website".to_string(),
            published: None,
            json_ld: None,
        }
    }

    fn list_entry(&self, post: &PostRecord) -> ListEntry {
        ListEntry {
            title: post.title.clone(),
            href: escape_html(&self.post_path(&post.slug)),
            date: escape_html(&self.format_date(post.date)),
            iso_date: post.date.to_string(),
            excerpt: post
                .description
                .clone()
                .unwrap_or_else(|| post.excerpt.clone()),
            series: self.series_links(&post.series),
        }
    }

    fn series_links(&self, series: &[String]) -> Vec<Link> {
        series
            .iter()
            .filter(|name| !kebab_case(name).is_empty())
            .map(|name| Link {
                title: name.clone(),
                href: escape_html(&self.series_path(name)),
            })
            .collect()
    }

    fn neighbor(&self, slug: Option<&str>, graph: &ContentGraph) -> Option<Link> {
        let post = graph.post(slug?)?;
        Some(Link {
            title: post.title.clone(),
            href: escape_html(&self.post_path(&post.slug)),
        })
    }

    fn format_date(&self, date: NaiveDate) -> String {
        let mut formatted = String::new();
        if write!(formatted, "{}", date.format(&self.site.date_format)).is_err() {
            formatted.clear();
            let _ = write!(formatted, "{}", date.format(DEFAULT_DATE_FORMAT));
        }
        formatted
    }
}

/// Keep a JSON payload from closing its `<script>` element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use folio_highlight::{PlainTokenizer, Theme};
    use folio_mdx::parse_mdx;
    use pretty_assertions::assert_eq;

    fn renderer() -> PageRenderer<PlainTokenizer> {
        let code = CodeRenderer::with_tokenizer(Arc::new(Theme::default()), PlainTokenizer)
            .with_live_languages(["js"]);
        PageRenderer::new(
            SiteInfo {
                title: "sean.wtf".to_string(),
                site_url: "https://sean.wtf/".to_string(),
                ..SiteInfo::default()
            },
            code,
        )
    }

    fn record(slug: &str, date: &str, source: &str) -> PostRecord {
        let doc = parse_mdx(source).unwrap();
        PostRecord {
            slug: slug.to_string(),
            title: format!("Title {}", slug),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            series: vec!["Deep Dives".to_string()],
            link: None,
            description: None,
            excerpt: doc.excerpt,
            time_to_read: doc.time_to_read,
            body: doc.body,
            toc: doc.toc,
            source_path: PathBuf::from(format!("{}.mdx", slug)),
            prev: None,
            next: None,
        }
    }

    fn graph() -> ContentGraph {
        ContentGraph::from_posts(vec![
            record("older", "2019-01-01", "Old post."),
            record(
                "newer",
                "2019-06-01",
                "Intro.\n\n```js live\nconsole.log(1);\n```\n\n```text\nplain\n```\n",
            ),
        ])
        .unwrap()
    }

    #[test]
    fn renders_post_document() {
        let renderer = renderer();
        let graph = graph();
        let post = graph.post("newer").unwrap();

        let html = renderer.render_post(post, &graph).unwrap();

        assert!(html.contains("<title>sean.wtf · Title newer</title>"));
        assert!(html.contains(r#"<h1 class="post-title"><a href="/newer">Title newer</a></h1>"#));
        assert!(html.contains("Published: 06/01/2019"));
        assert!(html.contains(r##"<a href="/series/deep-dives">#Deep Dives</a>"##));
        assert!(html.contains(r#"<link rel="canonical" href="https://sean.wtf/newer">"#));
        assert!(html.contains(r#"data-live-id="block-3""#));
        assert!(html.contains(r#"<span class="token plain">plain</span>"#));
        assert!(!html.contains("post-reply"));
    }

    #[test]
    fn renders_table_of_contents() {
        let renderer = renderer();
        let graph = ContentGraph::from_posts(vec![record(
            "guide",
            "2019-01-01",
            "Intro.\n\n## Setup & Install\n\nSteps.\n\n### Details\n\nMore.\n",
        )])
        .unwrap();

        let html = renderer
            .render_post(graph.post("guide").unwrap(), &graph)
            .unwrap();

        assert!(html.contains(r#"<nav class="toc" aria-label="Contents">"#));
        assert!(html.contains(
            r##"<li class="toc-level-2"><a href="#setup-install">Setup &amp; Install</a></li>"##
        ));
        assert!(html.contains(r##"<li class="toc-level-3"><a href="#details">Details</a></li>"##));
    }

    #[test]
    fn omits_empty_table_of_contents() {
        let renderer = renderer();
        let graph = graph();

        let html = renderer
            .render_post(graph.post("older").unwrap(), &graph)
            .unwrap();

        assert!(!html.contains(r#"class="toc""#));
    }

    #[test]
    fn omits_missing_neighbor() {
        let renderer = renderer();
        let graph = graph();

        let newest = renderer
            .render_post(graph.post("newer").unwrap(), &graph)
            .unwrap();
        let oldest = renderer
            .render_post(graph.post("older").unwrap(), &graph)
            .unwrap();

        assert!(newest.contains(r#"<a class="prev" rel="prev" href="/older">"#));
        assert!(!newest.contains(r#"class="next""#));
        assert!(oldest.contains(r#"<a class="next" rel="next" href="/newer">"#));
        assert!(!oldest.contains(r#"class="prev""#));
    }

    #[test]
    fn dangling_neighbor_is_omitted() {
        let renderer = renderer();
        let graph = graph();
        let mut post = graph.post("older").unwrap().clone();
        post.prev = Some("deleted-post".to_string());

        let html = renderer.render_post(&post, &graph).unwrap();

        assert!(!html.contains("deleted-post"));
    }

    #[test]
    fn renders_reply_link_below_title() {
        let renderer = renderer();
        let graph = graph();
        let mut post = graph.post("older").unwrap().clone();
        post.link = Some("https://example.com/a?b=1&c=2".to_string());

        let html = renderer.render_post(&post, &graph).unwrap();

        assert!(html.contains(r#"<a href="/older">Title older</a>"#));
        assert!(html.contains(
            r#"Re: <a href="https://example.com/a?b=1&amp;c=2" target="_blank" rel="noopener noreferrer">"#
        ));
    }

    #[test]
    fn embeds_json_ld_safely() {
        let renderer = renderer();
        let graph = graph();
        let mut post = graph.post("older").unwrap().clone();
        post.title = "Closing </script> tags".to_string();

        let html = renderer.render_post(&post, &graph).unwrap();

        assert!(html.contains(r#"<script type="application/ld+json">"#));
        assert!(html.contains(r#""@type":"BlogPosting""#));
        assert!(html.contains(r#"Closing <\/script> tags"#));
    }

    #[test]
    fn series_path_is_stable() {
        let renderer = renderer();

        assert_eq!(renderer.series_path("Deep Dives"), "/series/deep-dives");
        assert_eq!(renderer.series_path("Deep Dives"), "/series/deep-dives");
    }

    #[test]
    fn rendering_is_repeatable() {
        let renderer = renderer();
        let graph = graph();
        let post = graph.post("newer").unwrap();

        assert_eq!(
            renderer.render_post(post, &graph).unwrap(),
            renderer.render_post(post, &graph).unwrap()
        );
    }

    #[test]
    fn falls_back_on_unrenderable_date_format() {
        let mut renderer = renderer();
        renderer.site.date_format = "%Q".to_string();

        let date = NaiveDate::from_ymd_opt(2020, 2, 3).unwrap();

        assert_eq!(renderer.format_date(date), "02/03/2020");
    }

    #[test]
    fn renders_series_and_index() {
        let renderer = renderer();
        let graph = graph();
        let series = graph.series();

        let series_html = renderer.render_series(&series[0]).unwrap();
        let index_html = renderer.render_index(&graph).unwrap();

        assert!(series_html.contains(r#"<h1 class="list-title">#Deep Dives</h1>"#));
        assert!(series_html.contains(r#"<a href="/older">Title older</a>"#));
        assert!(index_html.contains(r#"<a href="/newer">Title newer</a>"#));
        assert!(index_html.contains("Old post."));
    }
}
