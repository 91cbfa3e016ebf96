//! Widget manifests (`widget.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mantle_element::{AdapterConfig, ConfigError};

/// File name a widget directory must contain.
pub const MANIFEST_FILE: &str = "widget.toml";

/// Declarative description of one widget's custom element.
///
/// ```toml
/// tag = "packages-widget"
/// component = "default"
/// module = "./Package.js"
/// json_attributes = ["packages", "translatedTexts"]
/// shadow = false
///
/// [attributes]
/// packages = "packages"
/// translated-texts = "translatedTexts"
///
/// [events]
/// onViewDetails = "view-details"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetManifest {
    /// Custom element tag name
    pub tag: String,

    /// Exported component name, or "default" for the default export
    pub component: String,

    /// Module specifier the component is imported from
    pub module: String,

    /// Observed attribute -> prop name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Attribute or prop names holding JSON
    #[serde(default)]
    pub json_attributes: Vec<String>,

    /// Callback prop -> DOM event name
    #[serde(default)]
    pub events: BTreeMap<String, String>,

    /// Callback prop -> JavaScript function source applied to the payload
    #[serde(default)]
    pub event_transforms: BTreeMap<String, String>,

    /// Render into a shadow root
    #[serde(default = "default_shadow")]
    pub shadow: bool,

    /// Stylesheet injected into the shadow root, relative to the manifest
    #[serde(default)]
    pub styles: Option<PathBuf>,

    /// Delay of the re-render scheduled on connect, 0 disables it
    #[serde(default = "default_deferred_render_ms")]
    pub deferred_render_ms: u64,
}

fn default_shadow() -> bool {
    true
}

fn default_deferred_render_ms() -> u64 {
    mantle_element::DEFERRED_RENDER_DELAY.as_millis() as u64
}

/// Errors that can occur while loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid component export '{0}': expected a JavaScript identifier or 'default'")]
    InvalidComponent(String),

    #[error("Module specifier is empty")]
    EmptyModule,

    #[error("Failed to read styles {path}: {source}")]
    Styles {
        path: String,
        source: std::io::Error,
    },
}

impl WidgetManifest {
    /// Parse a manifest from TOML text.
    pub fn parse(source: &str, path: &Path) -> Result<Self, ManifestError> {
        toml::from_str(source).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read, parse and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let manifest = Self::parse(&source, path)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Adapter configuration described by this manifest.
    ///
    /// The component is carried by its export name. Event transforms are
    /// JavaScript source and only exist in generated modules.
    pub fn to_adapter_config(&self) -> Result<AdapterConfig<String>, ConfigError> {
        let mut builder = AdapterConfig::builder(self.tag.clone(), self.component.clone())
            .attributes(self.attributes.clone())
            .shadow(self.shadow)
            .deferred_render(
                (self.deferred_render_ms > 0)
                    .then(|| std::time::Duration::from_millis(self.deferred_render_ms)),
            );

        for name in &self.json_attributes {
            builder = builder.json_attribute(name.clone());
        }
        for (callback, event) in &self.events {
            builder = builder.event(callback.clone(), event.clone());
        }

        builder.build()
    }

    /// Check the manifest against the custom element rules.
    pub fn validate(&self) -> Result<(), ManifestError> {
        self.to_adapter_config()?;

        if self.component != "default" && !is_js_identifier(&self.component) {
            return Err(ManifestError::InvalidComponent(self.component.clone()));
        }

        if self.module.trim().is_empty() {
            return Err(ManifestError::EmptyModule);
        }

        for callback in self.event_transforms.keys() {
            if !self.events.contains_key(callback) {
                tracing::warn!(
                    tag = %self.tag,
                    callback = %callback,
                    "Event transform has no event mapping and will never run"
                );
            }
        }

        Ok(())
    }

    /// Read the stylesheet this manifest points at, if any.
    pub fn read_styles(&self, manifest_dir: &Path) -> Result<Option<String>, ManifestError> {
        let Some(styles) = &self.styles else {
            return Ok(None);
        };

        let path = manifest_dir.join(styles);
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| ManifestError::Styles {
                path: path.display().to_string(),
                source,
            })
    }
}

/// Whether `name` is a plain JavaScript identifier.
fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
