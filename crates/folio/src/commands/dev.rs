//! Development server command.

use std::path::Path;

use anyhow::Result;
use folio_server::{DevServer, DevServerConfig};

use crate::config::ConfigFile;

/// Run the dev server.
pub async fn run(config_path: &Path, port: u16, open: bool) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;

    let mut build = file_config.build_config();
    build.minify = false;
    build.dev = true;

    let config = DevServerConfig {
        build,
        port,
        open,
        evaluators: file_config.live.evaluators,
        evaluate_on_mount: file_config.live.evaluate_on_mount,
        ..Default::default()
    };

    DevServer::new(config).start().await?;

    Ok(())
}
