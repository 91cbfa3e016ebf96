//! Widget bundle builder.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::catalog::{CatalogError, SkippedWidget, Widget, WidgetCatalog};
use crate::generator::{generate_widget_module, BuildMode};
use crate::manifest::MANIFEST_FILE;

/// Name of the entry index written next to the modules.
pub const MANIFEST_JSON: &str = "manifest.json";

/// Configuration for building widget modules.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding one subdirectory per widget
    pub widgets_dir: PathBuf,

    /// Output directory
    pub out_dir: PathBuf,

    pub mode: BuildMode,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            widgets_dir: PathBuf::from("src/widgets"),
            out_dir: PathBuf::from("dist"),
            mode: BuildMode::Development,
        }
    }
}

/// One generated module.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltWidget {
    #[serde(skip)]
    pub name: String,

    /// Custom element tag
    pub tag: String,

    /// File name relative to the output directory
    pub file: String,
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildReport {
    pub widgets: Vec<BuiltWidget>,

    /// Widget directories whose manifest could not be used
    pub skipped: Vec<SkippedWidget>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    pub out_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Output directory {out_dir} overlaps widgets directory {widgets_dir}")]
    OutDirOverlap {
        out_dir: String,
        widgets_dir: String,
    },
}

#[derive(Serialize)]
struct EntryIndex<'a> {
    mode: BuildMode,
    widgets: BTreeMap<&'a str, &'a BuiltWidget>,
}

/// What a previous build recorded in `manifest.json`.
#[derive(Deserialize)]
struct PreviousIndex {
    #[serde(default)]
    widgets: BTreeMap<String, serde_json::Value>,
}

/// Generate one module per widget plus `manifest.json`.
///
/// Each widget directory is copied to `<out_dir>/<name>/` so relative
/// component imports resolve. Output of widgets that no longer exist is
/// removed.
pub fn build_widgets(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    let start = Instant::now();

    let catalog = WidgetCatalog::scan(&config.widgets_dir)?;
    tracing::info!(
        "Found {} widgets in {}",
        catalog.len(),
        config.widgets_dir.display()
    );

    fs::create_dir_all(&config.out_dir).map_err(|source| write_error(&config.out_dir, source))?;
    check_overlap(config)?;

    let current: BTreeSet<&str> = catalog.widgets().iter().map(|w| w.name.as_str()).collect();
    prune_stale_output(&config.out_dir, &current)?;

    for widget in catalog.widgets() {
        copy_sources(widget, &config.out_dir)?;
    }

    let generated: Vec<(BuiltWidget, String)> = catalog
        .widgets()
        .par_iter()
        .map(|widget| {
            let built = BuiltWidget {
                name: widget.name.clone(),
                tag: widget.manifest.tag.clone(),
                file: format!("{}.js", widget.name),
            };
            (built, generate_widget_module(widget, config.mode))
        })
        .collect();

    let mut widgets = Vec::with_capacity(generated.len());
    for (built, code) in generated {
        let path = config.out_dir.join(&built.file);
        fs::write(&path, code).map_err(|source| write_error(&path, source))?;
        tracing::debug!(tag = %built.tag, "Wrote {}", path.display());
        widgets.push(built);
    }

    let index = EntryIndex {
        mode: config.mode,
        widgets: widgets.iter().map(|w| (w.name.as_str(), w)).collect(),
    };
    let index_path = config.out_dir.join(MANIFEST_JSON);
    let json = serde_json::to_string_pretty(&index).unwrap_or_else(|_| "{}".to_string());
    fs::write(&index_path, json).map_err(|source| write_error(&index_path, source))?;

    Ok(BuildReport {
        widgets,
        skipped: catalog.skipped().to_vec(),
        duration_ms: start.elapsed().as_millis() as u64,
        out_dir: config.out_dir.clone(),
    })
}

fn check_overlap(config: &BuildConfig) -> Result<(), BuildError> {
    let out_dir = fs::canonicalize(&config.out_dir)
        .map_err(|source| write_error(&config.out_dir, source))?;
    let widgets_dir = fs::canonicalize(&config.widgets_dir)
        .map_err(|source| write_error(&config.widgets_dir, source))?;

    if out_dir.starts_with(&widgets_dir) || widgets_dir.starts_with(&out_dir) {
        return Err(BuildError::OutDirOverlap {
            out_dir: config.out_dir.display().to_string(),
            widgets_dir: config.widgets_dir.display().to_string(),
        });
    }
    Ok(())
}

/// Remove modules and source copies of widgets not in `current`.
///
/// Top-level `*.js` files are modules; source directories are only removed
/// when the previous `manifest.json` lists them.
fn prune_stale_output(out_dir: &Path, current: &BTreeSet<&str>) -> Result<(), BuildError> {
    let entries = fs::read_dir(out_dir).map_err(|source| write_error(out_dir, source))?;
    for entry in entries {
        let path = entry.map_err(|source| write_error(out_dir, source))?.path();
        let is_module = path.is_file() && path.extension().is_some_and(|ext| ext == "js");
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if is_module && !current.contains(stem) {
            fs::remove_file(&path).map_err(|source| write_error(&path, source))?;
            tracing::debug!("Removed stale {}", path.display());
        }
    }

    let previous = fs::read_to_string(out_dir.join(MANIFEST_JSON))
        .ok()
        .and_then(|json| serde_json::from_str::<PreviousIndex>(&json).ok());
    for name in previous.into_iter().flat_map(|index| index.widgets.into_keys()) {
        let dir = out_dir.join(&name);
        if !current.contains(name.as_str()) && dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(|source| write_error(&dir, source))?;
            tracing::debug!("Removed stale {}", dir.display());
        }
    }

    Ok(())
}

/// Copy everything in the widget directory except its manifest.
fn copy_sources(widget: &Widget, out_dir: &Path) -> Result<(), BuildError> {
    let target = out_dir.join(&widget.name);
    if target.is_dir() {
        fs::remove_dir_all(&target).map_err(|source| write_error(&target, source))?;
    }
    fs::create_dir_all(&target).map_err(|source| write_error(&target, source))?;

    for entry in WalkDir::new(&widget.dir).min_depth(1) {
        let entry = entry.map_err(|e| write_error(&widget.dir, e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(&widget.dir) else {
            continue;
        };
        if relative == Path::new(MANIFEST_FILE) {
            continue;
        }

        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|source| write_error(&dest, source))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
            }
            fs::copy(entry.path(), &dest).map_err(|source| write_error(&dest, source))?;
        }
    }

    tracing::debug!(widget = %widget.name, "Copied sources to {}", target.display());
    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> BuildError {
    BuildError::Write {
        path: path.display().to_string(),
        source,
    }
}
