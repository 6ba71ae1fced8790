//! Content graph: published posts, their neighbors and series.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use walkdir::WalkDir;

use folio_mdx::{parse_mdx, CompiledBody, TocEntry};

/// One published post.
///
/// `prev` and `next` hold neighbor slugs, resolved through
/// [`ContentGraph::post`]; `prev` is the next older post, `next` the next
/// newer one.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    /// Series names in display casing, in frontmatter order
    pub series: Vec<String>,
    /// External link the post replies to
    pub link: Option<String>,
    pub description: Option<String>,
    pub excerpt: String,
    /// Minutes
    pub time_to_read: u32,
    pub body: CompiledBody,
    /// Headings in document order
    pub toc: Vec<TocEntry>,
    pub source_path: PathBuf,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Posts sharing a series tag.
#[derive(Debug, Clone)]
pub struct Series<'a> {
    /// Display name, as first written
    pub name: String,
    pub slug: String,
    /// Newest first
    pub posts: Vec<&'a PostRecord>,
}

/// Errors that can occur while loading content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Content directory not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing frontmatter in {0}")]
    MissingFrontmatter(String),

    #[error("Invalid date '{date}' in {path}")]
    InvalidDate { path: String, date: String },

    #[error("Invalid slug '{slug}' in {path}")]
    InvalidSlug { path: String, slug: String },

    #[error("Duplicate slug '{slug}' in {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },
}

/// All published posts, newest first, with neighbor links.
#[derive(Debug, Clone, Default)]
pub struct ContentGraph {
    posts: Vec<PostRecord>,
    by_slug: HashMap<String, usize>,
}

impl ContentGraph {
    /// Load every `.md` / `.mdx` post under a directory.
    pub fn load(dir: &Path) -> Result<Self, ContentError> {
        if !dir.exists() {
            return Err(ContentError::NotFound(dir.display().to_string()));
        }

        let mut posts = Vec::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "mdx" && ext != "md" {
                continue;
            }

            let source = fs::read_to_string(path).map_err(|e| ContentError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            match parse_post(path, &source)? {
                Some(post) => posts.push(post),
                None => tracing::debug!("Skipping draft {}", path.display()),
            }
        }

        Self::from_posts(posts)
    }

    /// Order posts newest first and link neighbors.
    pub fn from_posts(mut posts: Vec<PostRecord>) -> Result<Self, ContentError> {
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));

        let mut by_slug = HashMap::new();
        for (i, post) in posts.iter().enumerate() {
            if let Some(first) = by_slug.insert(post.slug.clone(), i) {
                return Err(ContentError::DuplicateSlug {
                    slug: post.slug.clone(),
                    first: posts[first].source_path.display().to_string(),
                    second: post.source_path.display().to_string(),
                });
            }
        }

        let slugs: Vec<String> = posts.iter().map(|p| p.slug.clone()).collect();
        for (i, post) in posts.iter_mut().enumerate() {
            post.next = i.checked_sub(1).map(|j| slugs[j].clone());
            post.prev = slugs.get(i + 1).cloned();
        }

        Ok(Self { posts, by_slug })
    }

    pub fn post(&self, slug: &str) -> Option<&PostRecord> {
        self.by_slug.get(slug).map(|&i| &self.posts[i])
    }

    /// Newest first.
    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Series ordered by slug.
    pub fn series(&self) -> Vec<Series<'_>> {
        let mut series: BTreeMap<String, Series<'_>> = BTreeMap::new();

        for post in &self.posts {
            for name in &post.series {
                let slug = kebab_case(name);
                let entry = series.entry(slug.clone()).or_insert_with(|| Series {
                    name: name.clone(),
                    slug,
                    posts: Vec::new(),
                });
                if !entry.posts.iter().any(|p| p.slug == post.slug) {
                    entry.posts.push(post);
                }
            }
        }

        series.into_values().collect()
    }
}

/// Parse one post file. Drafts yield `None`.
pub fn parse_post(path: &Path, source: &str) -> Result<Option<PostRecord>, ContentError> {
    let doc = parse_mdx(source).map_err(|e| ContentError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let Some(frontmatter) = doc.frontmatter else {
        return Err(ContentError::MissingFrontmatter(path.display().to_string()));
    };

    if frontmatter.draft {
        return Ok(None);
    }

    let date = parse_date(&frontmatter.date).ok_or_else(|| ContentError::InvalidDate {
        path: path.display().to_string(),
        date: frontmatter.date.clone(),
    })?;

    let slug = frontmatter
        .slug
        .as_deref()
        .map(|s| s.trim_matches('/').to_string())
        .unwrap_or_else(|| slug_from_path(path));

    if !valid_slug(&slug) {
        return Err(ContentError::InvalidSlug {
            path: path.display().to_string(),
            slug,
        });
    }

    Ok(Some(PostRecord {
        slug,
        title: frontmatter.title,
        date,
        series: frontmatter.series,
        link: frontmatter.link.filter(|l| !l.trim().is_empty()),
        description: frontmatter.description,
        excerpt: doc.excerpt,
        time_to_read: doc.time_to_read,
        body: doc.body,
        toc: doc.toc,
        source_path: path.to_path_buf(),
        prev: None,
        next: None,
    }))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and RFC 3339.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
}

/// `posts/hello-world.mdx` and `posts/hello-world/index.mdx` both give `hello-world`.
fn slug_from_path(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");

    let name = if stem == "index" {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or(stem)
    } else {
        stem
    };

    kebab_case(name)
}

/// Output directories the builder writes itself.
const RESERVED_SLUGS: &[&str] = &["series", "assets"];

/// A slug names a directory under the output root, so every `/` separated
/// segment must be a plain name.
fn valid_slug(slug: &str) -> bool {
    let first = slug.split('/').next().unwrap_or_default();
    if RESERVED_SLUGS.contains(&first) {
        return false;
    }

    slug.split('/').all(|segment| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && !segment.contains(['\\', ':'])
            && !segment.chars().any(char::is_control)
    })
}

/// Lowercase words joined by hyphens; camelCase, acronyms and digits split
/// into separate words.
pub fn kebab_case(text: &str) -> String {
    static WORD_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("Invalid word regex"));

    let mut words = Vec::new();

    for run in WORD_RUN.find_iter(text) {
        let chars: Vec<char> = run.as_str().chars().collect();
        let mut word = String::new();

        for (i, &c) in chars.iter().enumerate() {
            if let Some(&prev) = i.checked_sub(1).and_then(|j| chars.get(j)) {
                let next = chars.get(i + 1).copied();
                let boundary = (prev.is_lowercase() && c.is_uppercase())
                    || (prev.is_uppercase()
                        && c.is_uppercase()
                        && next.is_some_and(|n| n.is_lowercase()))
                    || (prev.is_numeric() != c.is_numeric());

                if boundary && !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
            }
            word.extend(c.to_lowercase());
        }

        if !word.is_empty() {
            words.push(word);
        }
    }

    words.join("-")
}
