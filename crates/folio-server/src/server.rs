//! Development server implementation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use folio_live::EvaluatorSet;
use folio_static::{BuildConfig, StaticBuilder};

use crate::live::live_router;
use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{hmr_client_script, HmrHub, HmrMessage};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Site build settings; `content_dir` is watched and `output_dir` served
    pub build: BuildConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Language -> argv of its evaluator command
    pub evaluators: BTreeMap<String, Vec<String>>,

    /// Evaluate each live panel once when it mounts
    pub evaluate_on_mount: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig {
                minify: false,
                dev: true,
                ..BuildConfig::default()
            },
            port: 7777,
            host: "127.0.0.1".to_string(),
            open: true,
            evaluators: BTreeMap::new(),
            evaluate_on_mount: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    hmr: HmrHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build the site, then serve it and rebuild on content changes.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr_text = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = addr_text
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr_text))?;

        let evaluators = Arc::new(EvaluatorSet::from_commands(&self.config.evaluators));

        let mut build = self.config.build.clone();
        build.dev = true;
        build.live_languages = evaluators.languages().map(str::to_string).collect();
        let output_dir = build.output_dir.clone();
        let content_dir = build.content_dir.clone();

        let builder = StaticBuilder::new(build);
        let hmr = HmrHub::new();

        // A broken post should not keep the server from starting
        rebuild(&builder, &hmr).await;

        let (watcher, mut rx) = FileWatcher::new(std::slice::from_ref(&content_dir))
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let watch_hmr = hmr.clone();
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                for event in &batch {
                    match event {
                        WatchEvent::PostChanged(path) => {
                            tracing::info!("Post changed: {}", path.display())
                        }
                        WatchEvent::PostRemoved(path) => {
                            tracing::info!("Post removed: {}", path.display())
                        }
                        WatchEvent::Other(path) => tracing::debug!("Changed: {}", path.display()),
                    }
                }
                rebuild(&builder, &watch_hmr).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let state = Arc::new(ServerState { hmr });

        let app = Router::new()
            .route("/__hmr", get(ws_handler))
            .route("/__hmr.js", get(hmr_script_handler))
            .merge(live_router(evaluators, self.config.evaluate_on_mount))
            .fallback_service(ServeDir::new(&output_dir))
            .with_state(state);

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::debug!("Could not open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Rebuild the site and tell connected pages about the outcome.
async fn rebuild(builder: &StaticBuilder, hmr: &HmrHub) {
    match builder.build().await {
        Ok(result) => {
            tracing::info!(
                "Built {} posts, {} series in {}ms",
                result.posts,
                result.series,
                result.duration_ms
            );
            hmr.send(HmrMessage::Reload);
        }
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            hmr.send(HmrMessage::BuildFailed {
                message: e.to_string(),
            });
        }
    }
}

/// Handler for the HMR WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward hub messages to one client.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hmr.subscribe();

    if send_message(&mut socket, &HmrMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &HmrMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the HMR client script.
async fn hmr_script_handler() -> impl IntoResponse {
    (
        [("content-type", "application/javascript")],
        hmr_client_script(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());
        assert_eq!(server.config.port, 7777);
        assert!(server.config.build.dev);
        assert!(!server.config.build.minify);
    }

    #[tokio::test]
    async fn rebuild_reports_outcome() {
        let temp = tempdir().unwrap();
        let posts = temp.path().join("posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("post.md"),
            "---\ntitle: Post\ndate: 2020-01-01\n---\nHello.\n",
        )
        .unwrap();

        let builder = StaticBuilder::new(BuildConfig {
            content_dir: posts.clone(),
            output_dir: temp.path().join("dist"),
            ..BuildConfig::default()
        });
        let hmr = HmrHub::new();
        let mut rx = hmr.subscribe();

        rebuild(&builder, &hmr).await;
        assert_eq!(rx.try_recv().unwrap(), HmrMessage::Reload);

        fs::write(
            posts.join("broken.md"),
            "---\ntitle: Broken\ndate: someday\n---\n",
        )
        .unwrap();

        rebuild(&builder, &hmr).await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            HmrMessage::BuildFailed { .. }
        ));
    }
}
