//! Initialize mantle in a project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing mantle...");

    let root = config_path.parent().unwrap_or(Path::new(""));
    scaffold(root, config_path, yes)?;

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'mantle dev' to start the development server.");

    Ok(())
}

fn scaffold(root: &Path, config_path: &Path, yes: bool) -> Result<()> {
    let widget_dir = root.join("src/widgets/greeting");

    if widget_dir.exists() && !yes {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            widget_dir.display()
        );
        return Ok(());
    }
    fs::create_dir_all(&widget_dir).context("Failed to create widget directory")?;

    write_file(config_path, DEFAULT_CONFIG, yes)?;
    write_file(&widget_dir.join("widget.toml"), DEFAULT_MANIFEST, yes)?;
    write_file(&widget_dir.join("Greeting.js"), DEFAULT_COMPONENT, yes)?;
    write_file(&widget_dir.join("greeting.css"), DEFAULT_STYLES, yes)?;

    Ok(())
}

fn write_file(path: &Path, contents: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        tracing::debug!("Keeping existing {}", path.display());
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Mantle Configuration

[widgets]
# One subdirectory per widget, each with a widget.toml
dir = "src/widgets"

[build]
# Generated custom element modules
out_dir = "dist"

# "development" keeps lifecycle logging, "production" strips it
mode = "development"

[server]
host = "127.0.0.1"
port = 5175
open = false

# Where the dev page loads bare imports from
[server.imports]
react = "https://esm.sh/react@19"
"react-dom/client" = "https://esm.sh/react-dom@19/client"
"#;

const DEFAULT_MANIFEST: &str = r#"# Custom element tag, must contain a hyphen
tag = "greeting-widget"

# Exported component name, or "default"
component = "Greeting"

# "./" paths are relative to this directory
module = "./Greeting.js"

json_attributes = ["names"]
styles = "greeting.css"

[attributes]
greeting = "greeting"
names = "names"

[events]
onSelect = "greeting-select"

[event_transforms]
onSelect = "(name) => ({ name })"
"#;

const DEFAULT_COMPONENT: &str = r#"import React from 'react';

export function Greeting({ greeting = 'Hello', names = [], onSelect }) {
  return React.createElement(
    'ul',
    { className: 'greeting' },
    names.map((name) =>
      React.createElement(
        'li',
        { key: name, onClick: () => onSelect && onSelect(name) },
        `${greeting}, ${name}!`
      )
    )
  );
}
"#;

const DEFAULT_STYLES: &str = r#".greeting {
  font-family: system-ui, sans-serif;
  list-style: none;
  padding: 0;
}

.greeting li {
  cursor: pointer;
}
"#;
