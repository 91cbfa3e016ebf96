//! Development server command.

use std::path::Path;

use anyhow::Result;
use mantle_server::{DevServer, DevServerConfig};

use crate::config::load_config;

/// Run the dev server.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    open: bool,
) -> Result<()> {
    let file_config = load_config(config_path)?;

    let config = DevServerConfig {
        widgets_dir: file_config.widgets.dir,
        out_dir: file_config.build.out_dir,
        port: port.unwrap_or(file_config.server.port),
        host: host.unwrap_or(file_config.server.host),
        open: open || file_config.server.open,
        mode: file_config.build.mode,
        imports: file_config.server.imports,
    };

    tracing::info!("Starting development server on port {}", config.port);

    DevServer::new(config).start().await?;

    Ok(())
}
