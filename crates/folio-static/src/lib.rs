//! Static site generator for folio blogs.
//!
//! Loads posts into a [`ContentGraph`], renders post, series and index pages
//! through a [`PageRenderer`], and writes them out with the generated assets.

pub mod assets;
pub mod builder;
pub mod content;
pub mod page;
pub mod templates;

pub use builder::{BuildConfig, BuildError, BuildResult, StaticBuilder};
pub use content::{kebab_case, parse_post, ContentError, ContentGraph, PostRecord, Series};
pub use page::{PageRenderer, SiteInfo, DEFAULT_DATE_FORMAT};
