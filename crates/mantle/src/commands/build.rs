//! Widget build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use mantle_codegen::{build_widgets, BuildConfig, BuildMode};

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, production: bool) -> Result<()> {
    tracing::info!("Building widgets...");

    let file_config = load_config(config_path)?;

    let config = BuildConfig {
        widgets_dir: file_config.widgets.dir,
        out_dir: output.unwrap_or(file_config.build.out_dir),
        mode: if production {
            BuildMode::Production
        } else {
            file_config.build.mode
        },
    };

    let report = tokio::task::spawn_blocking(move || build_widgets(&config)).await??;

    for skipped in &report.skipped {
        tracing::warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    tracing::info!(
        "Built {} widgets in {}ms",
        report.widgets.len(),
        report.duration_ms
    );
    tracing::info!("Output: {}", report.out_dir.display());

    Ok(())
}
