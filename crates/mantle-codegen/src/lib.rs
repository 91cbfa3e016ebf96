//! Widget manifests and custom element module generation.
//!
//! Widgets are described declaratively in `widget.toml` files. This crate
//! discovers them, validates them against the same rules the element adapter
//! enforces, and emits one self-registering ES module per widget.

pub mod builder;
pub mod catalog;
pub mod generator;
pub mod manifest;

pub use builder::{build_widgets, BuildConfig, BuildError, BuildReport, BuiltWidget, MANIFEST_JSON};
pub use catalog::{CatalogError, SkippedWidget, Widget, WidgetCatalog};
pub use generator::{generate_widget_module, BuildMode};
pub use manifest::{ManifestError, WidgetManifest, MANIFEST_FILE};
