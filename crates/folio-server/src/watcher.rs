//! Content directory watching.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Quiet period before a burst of filesystem events is reported.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A post was created or modified
    PostChanged(PathBuf),

    /// A post was deleted
    PostRemoved(PathBuf),

    /// Any other file under the content directory changed
    Other(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::PostChanged(p) | Self::PostRemoved(p) | Self::Other(p) => p,
        }
    }
}

/// File watcher for detecting content changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Events are debounced: a burst is reported once it has been quiet for
    /// a short while, each path at most once per burst.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<Vec<WatchEvent>>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            } else {
                tracing::warn!("Not watching missing path {}", path.display());
            }
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch: Vec<WatchEvent> = Vec::new();
                let mut pending = Some(first);

                while let Some(event) = pending.take() {
                    for path in &event.paths {
                        if let Some(e) = classify_event(path, &event.kind) {
                            batch.retain(|seen| seen.path() != e.path());
                            batch.push(e);
                        }
                    }
                    pending = sync_rx.recv_timeout(DEBOUNCE).ok();
                }

                if !batch.is_empty() && async_tx.blocking_send(batch).is_err() {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn is_post(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("mdx")
    )
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let path = path.to_path_buf();

    match kind {
        EventKind::Create(_) | EventKind::Modify(_) if is_post(&path) => {
            Some(WatchEvent::PostChanged(path))
        }
        EventKind::Remove(_) if is_post(&path) => Some(WatchEvent::PostRemoved(path)),
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            Some(WatchEvent::Other(path))
        }
        _ => None,
    }
}
