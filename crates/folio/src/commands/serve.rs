//! Preview server command.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

use folio_live::EvaluatorSet;
use folio_server::live_router;

use crate::config::ConfigFile;

/// Run the serve command.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;
    let dir = dir.unwrap_or_else(|| file_config.content.output.clone());

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'folio build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    let evaluators = Arc::new(EvaluatorSet::from_commands(&file_config.live.evaluators));
    if !evaluators.is_empty() {
        let languages: Vec<&str> = evaluators.languages().collect();
        tracing::info!("Live panels enabled for {}", languages.join(", "));
    }

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app: Router = Router::new()
        .merge(live_router(evaluators, file_config.live.evaluate_on_mount))
        .fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let url = format!("http://{}", addr);
    if let Err(e) = open::that(&url) {
        tracing::debug!("Could not open browser: {}", e);
    }

    axum::serve(listener, app).await?;

    Ok(())
}
