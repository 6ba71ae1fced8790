//! Asset pipeline for CSS and JavaScript processing.

use folio_highlight::Theme;

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Generate the main CSS file with the theme colors as custom properties.
    pub fn generate_css(theme: &Theme) -> String {
        let colors = theme.colors();
        format!(
            ":root {{\n  --primary: {};\n  --bg: {};\n  --background: {};\n  --text: {};\n}}\n\n{}",
            colors.primary, colors.bg, colors.background, colors.text, BASE_CSS
        )
    }

    /// Generate the main JavaScript file.
    pub fn generate_js() -> String {
        RUNTIME_JS.to_string()
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }
}

const BASE_CSS: &str = r#":root {
  --content-max-width: 42rem;
  --font-mono: ui-monospace, "SF Mono", Menlo, monospace;
}

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: Georgia, "Times New Roman", serif;
  background: var(--bg);
  color: var(--text);
  line-height: 1.7;
}

a {
  color: var(--primary);
}

.layout {
  min-height: 100vh;
}

.site-header {
  max-width: var(--content-max-width);
  margin: 0 auto;
  padding: 2rem 1rem 0;
}

.site-logo {
  font-weight: 700;
  font-size: 1.25rem;
  text-decoration: none;
}

.wrapper {
  max-width: var(--content-max-width);
  margin: 0 auto;
  padding: 2rem 1rem;
}

/* Posts */
.post-title {
  font-size: 2.25rem;
  line-height: 1.2;
  margin: 0 0 0.5rem;
}

.post-title a {
  color: inherit;
  text-decoration: none;
}

.post-reply {
  font-style: italic;
  margin-bottom: 0.5rem;
  overflow-wrap: anywhere;
}

.subline {
  font-size: 0.875rem;
  opacity: 0.7;
}

.series-tags {
  display: flex;
  flex-wrap: wrap;
  gap: 0.75rem;
  list-style: none;
  padding: 0;
  margin: 0.5rem 0 0;
  font-size: 0.875rem;
}

.toc {
  margin-top: 1.5rem;
  font-size: 0.875rem;
}

.toc ul {
  list-style: none;
  padding: 0;
  margin: 0;
}

.toc .toc-level-3 {
  padding-left: 1rem;
}

.toc .toc-level-4,
.toc .toc-level-5,
.toc .toc-level-6 {
  padding-left: 2rem;
}

.post-content {
  margin-top: 2rem;
}

.post-content .anchor {
  margin-left: -1em;
  padding-right: 0.25em;
  opacity: 0;
  text-decoration: none;
}

.post-content h2:hover .anchor,
.post-content h3:hover .anchor {
  opacity: 0.5;
}

.post-content code {
  font-family: var(--font-mono);
  font-size: 0.875em;
  background: var(--background);
  padding: 0.125rem 0.25rem;
}

.post-content blockquote {
  margin: 1.5rem 0;
  padding-left: 1rem;
  border-left: 3px solid var(--primary);
}

/* Code blocks */
.prism-code {
  position: relative;
  font-family: var(--font-mono);
  font-size: 0.875rem;
  line-height: 1.5;
  padding: 1rem;
  margin: 1.5rem 0;
  overflow-x: auto;
  white-space: pre;
}

.token-line {
  min-height: 1.5em;
}

.copy-btn {
  position: absolute;
  top: 0.5rem;
  right: 0.5rem;
  padding: 0.125rem 0.5rem;
  font-size: 0.75rem;
  background: var(--bg);
  color: var(--primary);
  border: 1px solid var(--primary);
  cursor: pointer;
  opacity: 0;
  transition: opacity 0.15s;
}

.prism-code:hover .copy-btn,
.copy-btn:focus-visible {
  opacity: 1;
}

/* Live panels */
.live-panel {
  margin: 1.5rem 0;
  border: 1px solid var(--primary);
}

.live-editor {
  display: block;
  width: 100%;
  padding: 1rem;
  border: 0;
  resize: vertical;
  font-family: var(--font-mono);
  font-size: 0.875rem;
  line-height: 1.5;
  color: var(--text);
  tab-size: 2;
}

.live-editor:focus {
  outline: 2px solid var(--primary);
  outline-offset: -2px;
}

.live-error {
  margin: 0;
  padding: 0.75rem 1rem;
  font-family: var(--font-mono);
  font-size: 0.8125rem;
  white-space: pre-wrap;
  background: var(--primary);
  color: var(--bg);
}

.live-preview {
  padding: 1rem;
  min-height: 1rem;
  font-family: var(--font-mono);
  font-size: 0.875rem;
  white-space: pre-wrap;
}

.live-panel[data-status="evaluating"] .live-preview {
  opacity: 0.5;
}

/* Navigation */
.prev-next {
  display: flex;
  justify-content: space-between;
  gap: 1rem;
  max-width: var(--content-max-width);
  margin: 0 auto;
  padding: 2rem 1rem 4rem;
}

.prev-next .next {
  margin-left: auto;
  text-align: right;
}

/* Lists */
.list-title {
  font-size: 1.5rem;
  margin: 0 0 2rem;
}

.post-entry {
  margin-bottom: 2.5rem;
}

.post-entry h2 {
  font-size: 1.5rem;
  margin: 0;
}

.post-entry h2 a {
  color: inherit;
  text-decoration: none;
}

.post-entry .subline a {
  margin-left: 0.5rem;
}

.excerpt {
  margin: 0.5rem 0 0;
}

@media (max-width: 640px) {
  .post-title {
    font-size: 1.75rem;
  }

  .prev-next {
    flex-direction: column;
  }
}
"#;

const RUNTIME_JS: &str = r#"(function() {
  'use strict';

  // Copy button for highlighted blocks
  document.querySelectorAll('pre.prism-code').forEach(pre => {
    if (pre.querySelector('.copy-btn')) return;

    const btn = document.createElement('button');
    btn.className = 'copy-btn';
    btn.textContent = 'Copy';
    btn.setAttribute('type', 'button');

    btn.addEventListener('click', async () => {
      const text = Array.from(pre.querySelectorAll('.token-line'))
        .map(line => line.textContent)
        .join('\n');

      try {
        await navigator.clipboard.writeText(text);
        btn.textContent = 'Copied!';
      } catch (err) {
        btn.textContent = 'Error';
      }
      setTimeout(() => { btn.textContent = 'Copy'; }, 2000);
    });

    pre.appendChild(btn);
  });

  // Live panels
  const panels = new Map();
  document.querySelectorAll('.live-panel').forEach(el => {
    panels.set(el.dataset.liveId, el);
  });
  if (panels.size === 0) return;

  const protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
  let socket = null;

  function send(message) {
    if (socket && socket.readyState === WebSocket.OPEN) {
      socket.send(JSON.stringify(message));
    }
  }

  function mountAll() {
    panels.forEach((el, id) => {
      const editor = el.querySelector('.live-editor');
      send({ type: 'mount', panel: id, language: el.dataset.language, text: editor.value });
    });
  }

  function apply(update) {
    const el = panels.get(update.panel);
    if (!el) return;

    if (update.type === 'rejected') {
      console.warn('[live] ' + update.panel + ': ' + update.reason);
      el.dataset.status = 'rejected';
      el.querySelector('.live-editor').readOnly = true;
      return;
    }

    el.dataset.status = update.status;
    const error = el.querySelector('.live-error');
    error.hidden = update.error == null;
    error.textContent = update.error || '';
    el.querySelector('.live-preview').textContent = update.preview || '';
  }

  function connect() {
    socket = new WebSocket(protocol + '//' + location.host + '/__live');
    socket.addEventListener('open', mountAll);
    socket.addEventListener('message', event => {
      try {
        apply(JSON.parse(event.data));
      } catch (err) {
        console.error('[live] bad message', err);
      }
    });
    socket.addEventListener('close', () => {
      socket = null;
      setTimeout(connect, 2000);
    });
  }

  panels.forEach((el, id) => {
    const editor = el.querySelector('.live-editor');
    let timer = null;
    editor.addEventListener('input', () => {
      clearTimeout(timer);
      timer = setTimeout(() => send({ type: 'edit', panel: id, text: editor.value }), 150);
    });
  });

  window.addEventListener('pagehide', () => {
    panels.forEach((_, id) => send({ type: 'unmount', panel: id }));
  });

  connect();
})();
"#;
