//! Scaffold a new blog in the current directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing folio...");

    let posts_dir = Path::new("posts");

    if posts_dir.exists() {
        if !yes {
            tracing::warn!("posts/ directory already exists. Use --yes to overwrite.");
            return Ok(());
        }
    } else {
        fs::create_dir_all(posts_dir).context("Failed to create posts directory")?;
    }

    write_file(config_path, DEFAULT_CONFIG, yes)?;
    write_file(&posts_dir.join("hello-world.mdx"), HELLO_WORLD, yes)?;
    write_file(&posts_dir.join("live-code.mdx"), LIVE_CODE, yes)?;

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'folio dev' to start the development server.");

    Ok(())
}

fn write_file(path: &Path, content: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        tracing::debug!("Keeping existing {}", path.display());
        return Ok(());
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());
    Ok(())
}

const DEFAULT_CONFIG: &str = r##"# folio configuration

[site]
title = "My Blog"
# Public origin used for canonical links and the sitemap
url = "https://example.com"
base_url = "/"
description = "Notes and experiments"
# author = "Your Name"

[content]
dir = "posts"
output = "dist"

[build]
minify = true
# chrono format for post dates
date_format = "%m/%d/%Y"

[theme]
primary = "#b5452b"
bg = "#fffdf8"
background = "#f6f1e7"
text = "#2d2a26"

[live]
# Evaluate live blocks once when a page opens instead of waiting for an edit
evaluate_on_mount = false

# Live blocks in these languages get an editor; the block source is written
# to the command's stdin and its stdout becomes the preview.
[live.evaluators]
js = ["node", "-"]
"##;

const HELLO_WORLD: &str = r#"---
title: Hello, World
date: 2019-01-01
series: [Meta]
description: The first post on this blog.
---

Welcome to the blog. Posts are Markdown files under `posts/` with a short
block of frontmatter on top.

## Code

Fenced blocks are highlighted:

```rust
fn main() {
    println!("hello");
}
```
"#;

const LIVE_CODE: &str = r#"---
title: Live Code
date: 2019-02-01
series: [Meta, Deep Dives]
---

Mark a block as `live` to make it editable. Each edit is evaluated and the
output shows up below the editor.

```js live
const double = n => n * 2;
console.log([1, 2, 3].map(double));
```
"#;
