//! Widget discovery.
//!
//! Every direct subdirectory of the widgets directory that holds a
//! `widget.toml` is one widget, named after the directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manifest::{WidgetManifest, MANIFEST_FILE};

/// A widget with its manifest loaded and styles inlined.
#[derive(Debug, Clone)]
pub struct Widget {
    /// Directory name, used for the output file
    pub name: String,

    /// Directory holding the manifest
    pub dir: PathBuf,

    pub manifest: WidgetManifest,

    /// Contents of the manifest's stylesheet
    pub styles: Option<String>,
}

/// A widget directory that could not be loaded.
#[derive(Debug, Clone)]
pub struct SkippedWidget {
    pub path: PathBuf,
    pub reason: String,
}

/// All widgets found under a directory.
#[derive(Debug, Default)]
pub struct WidgetCatalog {
    widgets: Vec<Widget>,
    skipped: Vec<SkippedWidget>,
}

/// Errors that can occur while scanning.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Widgets directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Tag <{tag}> is declared by both '{first}' and '{second}'")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },
}

impl WidgetCatalog {
    /// Scan `widgets_dir` for widget manifests.
    ///
    /// Unreadable or invalid manifests are recorded as skipped. Two widgets
    /// claiming the same tag is an error, since only one could ever register.
    pub fn scan(widgets_dir: &Path) -> Result<Self, CatalogError> {
        if !widgets_dir.is_dir() {
            return Err(CatalogError::DirectoryNotFound(
                widgets_dir.display().to_string(),
            ));
        }

        let mut catalog = WidgetCatalog::default();

        for entry in WalkDir::new(widgets_dir)
            .min_depth(2)
            .max_depth(2)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()) != Some(MANIFEST_FILE) {
                continue;
            }

            let Some(dir) = path.parent() else {
                continue;
            };
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("widget")
                .to_string();

            let loaded = WidgetManifest::load(path).and_then(|manifest| {
                let styles = manifest.read_styles(dir)?;
                Ok((manifest, styles))
            });

            match loaded {
                Ok((manifest, styles)) => {
                    tracing::debug!(widget = %name, tag = %manifest.tag, "Found widget");
                    catalog.widgets.push(Widget {
                        name,
                        dir: dir.to_path_buf(),
                        manifest,
                        styles,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    catalog.skipped.push(SkippedWidget {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut tags: HashMap<&str, &str> = HashMap::new();
        for widget in &catalog.widgets {
            if let Some(first) = tags.insert(&widget.manifest.tag, &widget.name) {
                return Err(CatalogError::DuplicateTag {
                    tag: widget.manifest.tag.clone(),
                    first: first.to_string(),
                    second: widget.name.clone(),
                });
            }
        }

        Ok(catalog)
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn skipped(&self) -> &[SkippedWidget] {
        &self.skipped
    }

    /// Look up a widget by directory name.
    pub fn get(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    /// Look up a widget by tag name.
    pub fn by_tag(&self, tag: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.manifest.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}
