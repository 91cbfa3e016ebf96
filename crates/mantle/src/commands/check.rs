//! Manifest validation command.

use std::path::Path;

use anyhow::{bail, Result};
use mantle_codegen::WidgetCatalog;

use crate::config::load_config;

/// Run the check command.
pub async fn run(config_path: &Path) -> Result<()> {
    let file_config = load_config(config_path)?;
    let catalog = WidgetCatalog::scan(&file_config.widgets.dir)?;

    for widget in catalog.widgets() {
        let manifest = &widget.manifest;
        tracing::info!(
            "<{}> {} ({} attributes, {} events, {})",
            manifest.tag,
            widget.name,
            manifest.attributes.len(),
            manifest.events.len(),
            if manifest.shadow { "shadow DOM" } else { "light DOM" }
        );
    }

    for skipped in catalog.skipped() {
        tracing::error!("{}: {}", skipped.path.display(), skipped.reason);
    }

    if !catalog.skipped().is_empty() {
        bail!("{} invalid widget manifests", catalog.skipped().len());
    }

    tracing::info!("{} widgets OK", catalog.len());
    Ok(())
}
