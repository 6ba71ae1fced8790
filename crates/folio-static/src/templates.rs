//! Template engine for rendering blog pages.

use minijinja::Environment;
use serde::Serialize;

/// Site-wide values available to every template.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    /// Site identifier, shown in the header and page titles
    pub title: String,
    /// Base URL for links, always ending in `/`, HTML-escaped
    pub base_url: String,
    /// Include the hot reload client
    pub dev: bool,
}

/// A navigable link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub title: String,
    /// HTML-escaped
    pub href: String,
}

/// Search and social metadata.
///
/// URL and date fields across these contexts are escaped by the caller and
/// emitted as-is; titles and prose are escaped by the templates.
#[derive(Debug, Clone, Serialize)]
pub struct Seo {
    pub title: String,
    pub description: String,
    pub canonical: String,
    /// `article` for posts, `website` otherwise
    pub og_type: String,
    /// ISO date for articles
    pub published: Option<String>,
    /// JSON-LD payload, already safe for a `<script>` element
    pub json_ld: Option<String>,
}

/// A post as shown on its own page.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub title: String,
    pub href: String,
    pub date: String,
    pub iso_date: String,
    pub time_to_read: u32,
    /// External link rendered as a `Re:` line
    pub link: Option<String>,
    pub series: Vec<Link>,
    pub toc: Vec<TocItem>,
    /// Rendered body HTML
    pub body: String,
}

/// A heading link in a post's table of contents.
#[derive(Debug, Clone, Serialize)]
pub struct TocItem {
    pub title: String,
    /// Pre-escaped `#anchor`
    pub href: String,
    pub level: u8,
}

/// Context for `post.html`.
#[derive(Debug, Clone, Serialize)]
pub struct PostContext {
    pub site: SiteContext,
    pub page_title: String,
    pub seo: Seo,
    pub post: PostView,
    pub prev: Option<Link>,
    pub next: Option<Link>,
}

/// A post as listed on the index and series pages.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub title: String,
    pub href: String,
    pub date: String,
    pub iso_date: String,
    pub excerpt: String,
    pub series: Vec<Link>,
}

/// Context for `list.html`.
#[derive(Debug, Clone, Serialize)]
pub struct ListContext {
    pub site: SiteContext,
    pub page_title: String,
    pub seo: Seo,
    pub heading: String,
    pub entries: Vec<ListEntry>,
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with default templates.
    pub fn new() -> Self {
        let mut env = Environment::new();

        for (name, source) in [
            ("base.html", BASE_TEMPLATE),
            ("post.html", POST_TEMPLATE),
            ("list.html", LIST_TEMPLATE),
            ("seo.html", SEO_TEMPLATE),
            ("prevnext.html", PREV_NEXT_TEMPLATE),
        ] {
            env.add_template(name, source)
                .unwrap_or_else(|e| panic!("Failed to add {} template: {}", name, e));
        }

        Self { env }
    }

    /// Render a page using the specified template.
    pub fn render_page<C: Serialize>(
        &self,
        template: &str,
        context: &C,
    ) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(template)?;
        tmpl.render(context)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ page_title }}</title>
  {% include "seo.html" %}
  <link rel="stylesheet" href="{{ site.base_url | safe }}assets/main.css">
</head>
<body>
  <div class="layout">
    <header class="site-header">
      <a href="{{ site.base_url | safe }}" class="site-logo">{{ site.title }}</a>
    </header>
    <main class="wrapper">
      {% block content %}{% endblock %}
    </main>
    {% block after %}{% endblock %}
  </div>
  <script src="{{ site.base_url | safe }}assets/main.js"></script>
  {% if site.dev %}<script src="/__hmr.js"></script>{% endif %}
</body>
</html>"##;

const SEO_TEMPLATE: &str = r##"<meta name="description" content="{{ seo.description }}">
  <link rel="canonical" href="{{ seo.canonical | safe }}">
  <meta property="og:site_name" content="{{ site.title }}">
  <meta property="og:type" content="{{ seo.og_type }}">
  <meta property="og:title" content="{{ seo.title }}">
  <meta property="og:description" content="{{ seo.description }}">
  <meta property="og:url" content="{{ seo.canonical | safe }}">
  {% if seo.published %}<meta property="article:published_time" content="{{ seo.published | safe }}">
  {% endif %}<meta name="twitter:card" content="summary">
  <meta name="twitter:title" content="{{ seo.title }}">
  <meta name="twitter:description" content="{{ seo.description }}">
  {% if seo.json_ld %}<script type="application/ld+json">{{ seo.json_ld | safe }}</script>{% endif %}"##;

const POST_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<article class="post">
  <h1 class="post-title"><a href="{{ post.href | safe }}">{{ post.title }}</a></h1>
  {% if post.link %}
  <div class="post-reply">Re: <a href="{{ post.link | safe }}" target="_blank" rel="noopener noreferrer">{{ post.link | safe }}</a></div>
  {% endif %}
  <div class="subline">
    <time datetime="{{ post.iso_date | safe }}">Published: {{ post.date | safe }}</time> &mdash; {{ post.time_to_read }} Min Read
  </div>
  {% if post.series %}
  <ul class="series-tags">
  {% for series in post.series %}
    <li><a href="{{ series.href | safe }}">#{{ series.title }}</a></li>
  {% endfor %}
  </ul>
  {% endif %}
  {% if post.toc %}
  <nav class="toc" aria-label="Contents">
    <ul>
    {% for item in post.toc %}
      <li class="toc-level-{{ item.level }}"><a href="{{ item.href | safe }}">{{ item.title }}</a></li>
    {% endfor %}
    </ul>
  </nav>
  {% endif %}
  <div class="post-content">
    {{ post.body | safe }}
  </div>
</article>
{% endblock %}

{% block after %}{% include "prevnext.html" %}{% endblock %}"##;

const PREV_NEXT_TEMPLATE: &str = r##"{% if prev or next %}
<nav class="prev-next">
  {% if prev %}<a class="prev" rel="prev" href="{{ prev.href | safe }}">&larr; {{ prev.title }}</a>{% endif %}
  {% if next %}<a class="next" rel="next" href="{{ next.href | safe }}">{{ next.title }} &rarr;</a>{% endif %}
</nav>
{% endif %}"##;

const LIST_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<section class="post-list">
  <h1 class="list-title">{{ heading }}</h1>
  {% for entry in entries %}
  <article class="post-entry">
    <h2><a href="{{ entry.href | safe }}">{{ entry.title }}</a></h2>
    <div class="subline">
      <time datetime="{{ entry.iso_date | safe }}">{{ entry.date | safe }}</time>
      {% for series in entry.series %}<a href="{{ series.href | safe }}">#{{ series.title }}</a> {% endfor %}
    </div>
    <p class="excerpt">{{ entry.excerpt }}</p>
  </article>
  {% endfor %}
</section>
{% endblock %}"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteContext {
        SiteContext {
            title: "sean.wtf".to_string(),
            base_url: "/".to_string(),
            dev: false,
        }
    }

    fn seo() -> Seo {
        Seo {
            title: "Post".to_string(),
            description: "About things".to_string(),
            canonical: "https://sean.wtf/post".to_string(),
            og_type: "article".to_string(),
            published: Some("2020-01-01".to_string()),
            json_ld: None,
        }
    }

    fn post_context(prev: Option<Link>, next: Option<Link>) -> PostContext {
        PostContext {
            site: site(),
            page_title: "sean.wtf · Post".to_string(),
            seo: seo(),
            post: PostView {
                title: "Post <1>".to_string(),
                href: "/post".to_string(),
                date: "01/01/2020".to_string(),
                iso_date: "2020-01-01".to_string(),
                time_to_read: 3,
                link: None,
                series: vec![],
                toc: vec![],
                body: "<p>Hello world</p>".to_string(),
            },
            prev,
            next,
        }
    }

    #[test]
    fn renders_post_page() {
        let engine = TemplateEngine::new();

        let html = engine
            .render_page("post.html", &post_context(None, None))
            .unwrap();

        assert!(html.contains("<title>sean.wtf · Post</title>"));
        assert!(html.contains("<p>Hello world</p>"));
        assert!(html.contains("Post &lt;1&gt;"));
        assert!(html.contains(r#"<meta property="og:type" content="article">"#));
        assert!(!html.contains("prev-next"));
        assert!(!html.contains("series-tags"));
        assert!(!html.contains("__hmr.js"));
    }

    #[test]
    fn renders_only_present_neighbors() {
        let engine = TemplateEngine::new();
        let next = Link {
            title: "Newer".to_string(),
            href: "/newer".to_string(),
        };

        let html = engine
            .render_page("post.html", &post_context(None, Some(next)))
            .unwrap();

        assert!(html.contains(r#"<a class="next" rel="next" href="/newer">Newer &rarr;</a>"#));
        assert!(!html.contains(r#"class="prev""#));
    }

    #[test]
    fn renders_list_page() {
        let engine = TemplateEngine::new();
        let context = ListContext {
            site: SiteContext { dev: true, ..site() },
            page_title: "sean.wtf".to_string(),
            seo: Seo {
                og_type: "website".to_string(),
                published: None,
                ..seo()
            },
            heading: "Posts".to_string(),
            entries: vec![ListEntry {
                title: "Hooks".to_string(),
                href: "/hooks".to_string(),
                date: "02/10/2019".to_string(),
                iso_date: "2019-02-10".to_string(),
                excerpt: "All about hooks".to_string(),
                series: vec![Link {
                    title: "Deep Dives".to_string(),
                    href: "/series/deep-dives".to_string(),
                }],
            }],
        };

        let html = engine.render_page("list.html", &context).unwrap();

        assert!(html.contains(r#"<a href="/hooks">Hooks</a>"#));
        assert!(html.contains(r##"<a href="/series/deep-dives">#Deep Dives</a>"##));
        assert!(html.contains("/__hmr.js"));
        assert!(!html.contains("article:published_time"));
    }
}
