//! Custom element module generator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Widget;

/// Whether generated modules keep their debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

/// Generate the ES module that defines and registers `widget`'s element.
///
/// The module wraps the component in a class driving one React root from
/// the custom element lifecycle and registers it only when the tag is free,
/// so evaluating it twice is harmless.
pub fn generate_widget_module(widget: &Widget, mode: BuildMode) -> String {
    let manifest = &widget.manifest;
    let class_name = element_class_name(&manifest.tag);
    let module = js_string(&import_specifier(widget));

    let import = if manifest.component == "default" {
        format!("import Component from {module};")
    } else {
        format!("import {{ {} as Component }} from {module};", manifest.component)
    };

    let transform_entries: String = manifest
        .event_transforms
        .iter()
        .filter(|(callback, _)| manifest.events.contains_key(*callback))
        .map(|(callback, source)| format!("  {}: {},\n", js_string(callback), source.trim()))
        .collect();

    let styles = widget
        .styles
        .as_deref()
        .map(js_string)
        .unwrap_or_else(|| "null".to_string());

    format!(
        r#"/**
 * {class_name} - generated custom element
 * Widget: {name}
 * Tag: <{tag}>
 */

import React from 'react';
import ReactDOM from 'react-dom/client';
{import}

const TAG_NAME = {tag_literal};
const ATTRIBUTES = {attributes};
const JSON_ATTRIBUTES = {json_attributes};
const EVENTS = {events};
const EVENT_TRANSFORMS = {{
{transform_entries}}};
const USE_SHADOW_DOM = {shadow};
const STYLES = {styles};
const DEFERRED_RENDER_MS = {deferred_render_ms};
const DEBUG = {debug};

export class {class_name} extends HTMLElement {{
  static get observedAttributes() {{
    return Object.keys(ATTRIBUTES);
  }}

  #root = null;
  #mountPoint;
  #deferredRender = null;

  constructor() {{
    super();

    this.#mountPoint = USE_SHADOW_DOM ? this.attachShadow({{ mode: 'open' }}) : this;

    const container = document.createElement('div');
    container.id = `${{TAG_NAME}}-root`;
    this.#mountPoint.appendChild(container);
  }}

  connectedCallback() {{
    this.#injectStyles();
    this.#render();
    this.#scheduleDeferredRender();
  }}

  disconnectedCallback() {{
    this.#cancelDeferredRender();
    if (this.#root) {{
      this.#root.unmount();
      this.#root = null;
    }}
  }}

  attributeChangedCallback(_name, oldValue, newValue) {{
    if (oldValue !== newValue && this.isConnected) {{
      this.#render();
    }}
  }}

  // Host pages that reveal elements right after insertion get one more
  // render once layout has settled.
  #scheduleDeferredRender() {{
    if (DEFERRED_RENDER_MS <= 0) return;
    this.#cancelDeferredRender();
    this.#deferredRender = setTimeout(() => {{
      this.#deferredRender = null;
      if (this.isConnected) {{
        if (DEBUG) console.debug(`[${{TAG_NAME}}] Deferred render`);
        this.#render();
      }}
    }}, DEFERRED_RENDER_MS);
  }}

  #cancelDeferredRender() {{
    if (this.#deferredRender !== null) {{
      clearTimeout(this.#deferredRender);
      this.#deferredRender = null;
    }}
  }}

  #parseAttribute(attrName, value) {{
    if (value === null) return undefined;

    const propName = ATTRIBUTES[attrName];
    if (JSON_ATTRIBUTES.includes(attrName) || JSON_ATTRIBUTES.includes(propName)) {{
      try {{
        return JSON.parse(value);
      }} catch (error) {{
        console.error(`[${{TAG_NAME}}] Failed to parse JSON attribute "${{attrName}}":`, error);
        return undefined;
      }}
    }}

    return value;
  }}

  #attributeProps() {{
    const props = {{}};
    for (const [attrName, propName] of Object.entries(ATTRIBUTES)) {{
      const value = this.#parseAttribute(attrName, this.getAttribute(attrName));
      if (value !== undefined) {{
        props[propName] = value;
      }}
    }}
    return props;
  }}

  #eventProps() {{
    const handlers = {{}};
    for (const [callbackName, eventName] of Object.entries(EVENTS)) {{
      handlers[callbackName] = (data) => {{
        const transform = EVENT_TRANSFORMS[callbackName];
        const detail = transform ? transform(data) : data;
        this.dispatchEvent(new CustomEvent(eventName, {{
          detail,
          bubbles: true,
          composed: USE_SHADOW_DOM,
        }}));
        if (DEBUG) console.debug(`[${{TAG_NAME}}] ${{eventName}} event fired:`, detail);
      }};
    }}
    return handlers;
  }}

  #injectStyles() {{
    if (!USE_SHADOW_DOM || !STYLES) return;
    if (this.#mountPoint.querySelector(`style[data-widget="${{TAG_NAME}}"]`)) return;

    const style = document.createElement('style');
    style.setAttribute('data-widget', TAG_NAME);
    style.textContent = STYLES;
    this.#mountPoint.appendChild(style);
  }}

  #render() {{
    const container = this.#mountPoint.querySelector(`#${{TAG_NAME}}-root`);
    if (!container) {{
      console.error(`[${{TAG_NAME}}] Container not found: #${{TAG_NAME}}-root`);
      return;
    }}

    const props = {{ ...this.#attributeProps(), ...this.#eventProps() }};
    if (DEBUG) console.debug(`[${{TAG_NAME}}] Rendering with props:`, props);

    if (!this.#root) {{
      this.#root = ReactDOM.createRoot(container);
    }}
    this.#root.render(React.createElement(Component, props));
  }}
}}

if (typeof customElements !== 'undefined' && !customElements.get(TAG_NAME)) {{
  customElements.define(TAG_NAME, {class_name});
  if (DEBUG) console.debug(`[mantle] Custom element registered: <${{TAG_NAME}}>`);
}}

export default {class_name};
"#,
        class_name = class_name,
        name = widget.name,
        tag = manifest.tag,
        import = import,
        tag_literal = js_string(&manifest.tag),
        attributes = js_value(&manifest.attributes),
        json_attributes = js_value(&manifest.json_attributes),
        events = js_value(&manifest.events),
        transform_entries = transform_entries,
        shadow = manifest.shadow,
        styles = styles,
        deferred_render_ms = manifest.deferred_render_ms,
        debug = mode == BuildMode::Development,
    )
}

/// Names the generated module declares or relies on at top level.
const MODULE_BINDINGS: &[&str] = &["React", "ReactDOM", "Component", "HTMLElement"];

/// Element class name for `tag`, never shadowing a module binding.
fn element_class_name(tag: &str) -> String {
    let name = format!("{}Element", to_pascal_case(tag));
    if MODULE_BINDINGS.contains(&name.as_str()) {
        format!("Mantle{name}")
    } else {
        name
    }
}

/// Specifier the generated module imports the component from.
///
/// `./` specifiers are relative to the widget directory, which the build
/// copies to `<out_dir>/<name>/`. Anything else is emitted unchanged.
fn import_specifier(widget: &Widget) -> String {
    match widget.manifest.module.strip_prefix("./") {
        Some(path) => format!("./{}/{}", widget.name, path),
        None => widget.manifest.module.clone(),
    }
}

/// Convert kebab-case to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split(['-', '.', '_'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Quote a string as a JavaScript literal.
///
/// JSON string syntax is valid JavaScript; `</` is split so inline styles
/// cannot close a surrounding `<script>` element.
fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string().replace("</", "<\\/")
}

fn js_value<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}
