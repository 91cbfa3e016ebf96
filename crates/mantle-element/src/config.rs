//! Adapter configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

/// Delay before the one-shot re-render scheduled on connect.
///
/// Host pages that toggle visibility right after inserting an element
/// (`x-show` and friends) would otherwise keep a render computed against a
/// hidden layout.
pub const DEFERRED_RENDER_DELAY: Duration = Duration::from_millis(100);

/// Maps a callback payload to the `detail` of the emitted event.
pub type EventTransform = Rc<dyn Fn(Value) -> Value>;

/// Hyphenated names the HTML Standard reserves for SVG and MathML.
const RESERVED_TAG_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

static TAG_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9._]*-[a-z0-9._-]*$").expect("Invalid tag name regex")
});

/// Errors raised while building an [`AdapterConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid custom element name '{0}': must start with a lowercase letter, contain a hyphen and use only [a-z0-9._-]")]
    InvalidTagName(String),

    #[error("Custom element name '{0}' is reserved")]
    ReservedTagName(String),

    #[error("Invalid attribute name '{0}': attribute names must be non-empty, lowercase and contain no whitespace")]
    InvalidAttributeName(String),

    #[error("Prop name for attribute '{0}' is empty")]
    EmptyPropName(String),

    #[error("Event name for callback '{0}' is empty")]
    EmptyEventName(String),
}

/// Check that `tag` is a valid custom element name.
pub fn validate_tag_name(tag: &str) -> Result<(), ConfigError> {
    if RESERVED_TAG_NAMES.contains(&tag) {
        return Err(ConfigError::ReservedTagName(tag.to_string()));
    }
    if !TAG_NAME_RE.is_match(tag) {
        return Err(ConfigError::InvalidTagName(tag.to_string()));
    }
    Ok(())
}

/// Check that `name` can be observed as an attribute.
///
/// HTML parsers lowercase attribute names, so a mapping key with uppercase
/// letters would never be reported back to the element.
pub fn validate_attribute_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_ascii_uppercase() || matches!(c, '"' | '\'' | '>' | '/' | '='));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidAttributeName(name.to_string()))
    }
}

/// Immutable description of one custom element.
///
/// `C` is whatever the [`Renderer`](crate::Renderer) knows how to render,
/// typically a component function or a handle to one.
#[derive(Clone)]
pub struct AdapterConfig<C> {
    tag_name: String,
    component: C,
    attributes: BTreeMap<String, String>,
    json_attributes: Vec<String>,
    events: BTreeMap<String, String>,
    event_transforms: HashMap<String, EventTransform>,
    shadow: bool,
    styles: Option<String>,
    deferred_render: Option<Duration>,
}

impl<C> AdapterConfig<C> {
    /// Start building a configuration for `tag_name` rendering `component`.
    pub fn builder(tag_name: impl Into<String>, component: C) -> AdapterConfigBuilder<C> {
        AdapterConfigBuilder {
            config: AdapterConfig {
                tag_name: tag_name.into(),
                component,
                attributes: BTreeMap::new(),
                json_attributes: Vec::new(),
                events: BTreeMap::new(),
                event_transforms: HashMap::new(),
                shadow: true,
                styles: None,
                deferred_render: Some(DEFERRED_RENDER_DELAY),
            },
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    /// Attribute name to prop name pairs, ordered by attribute name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(attr, prop)| (attr.as_str(), prop.as_str()))
    }

    /// Prop name an observed attribute is delivered under.
    pub fn prop_name(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    /// Names the element reports through `attribute_changed_callback`.
    pub fn observed_attributes(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    /// Whether the value of `attribute` is JSON encoded.
    ///
    /// The JSON list may name either the attribute or the prop it maps to.
    pub fn is_json_attribute(&self, attribute: &str) -> bool {
        let prop = self.prop_name(attribute);
        self.json_attributes
            .iter()
            .any(|name| name == attribute || Some(name.as_str()) == prop)
    }

    /// Callback prop name to event name pairs.
    pub fn events(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events
            .iter()
            .map(|(callback, event)| (callback.as_str(), event.as_str()))
    }

    pub fn event_transform(&self, callback: &str) -> Option<&EventTransform> {
        self.event_transforms.get(callback)
    }

    /// Whether the element renders into an attached shadow root.
    pub fn shadow(&self) -> bool {
        self.shadow
    }

    pub fn styles(&self) -> Option<&str> {
        self.styles.as_deref()
    }

    pub fn deferred_render(&self) -> Option<Duration> {
        self.deferred_render
    }

    /// Id of the anchor node the component is rendered into.
    pub fn anchor_id(&self) -> String {
        format!("{}-root", self.tag_name)
    }
}

impl<C> fmt::Debug for AdapterConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut transforms: Vec<&str> = self.event_transforms.keys().map(String::as_str).collect();
        transforms.sort_unstable();

        f.debug_struct("AdapterConfig")
            .field("tag_name", &self.tag_name)
            .field("attributes", &self.attributes)
            .field("json_attributes", &self.json_attributes)
            .field("events", &self.events)
            .field("event_transforms", &transforms)
            .field("shadow", &self.shadow)
            .field("styles", &self.styles.as_ref().map(String::len))
            .field("deferred_render", &self.deferred_render)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AdapterConfig`].
pub struct AdapterConfigBuilder<C> {
    config: AdapterConfig<C>,
}

impl<C> AdapterConfigBuilder<C> {
    /// Observe `attribute` and deliver its value as `prop`.
    pub fn attribute(mut self, attribute: impl Into<String>, prop: impl Into<String>) -> Self {
        self.config.attributes.insert(attribute.into(), prop.into());
        self
    }

    /// Observe several attribute/prop pairs at once.
    pub fn attributes<I, A, P>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, P)>,
        A: Into<String>,
        P: Into<String>,
    {
        for (attribute, prop) in pairs {
            self.config.attributes.insert(attribute.into(), prop.into());
        }
        self
    }

    /// Parse the attribute (or prop) named `name` as JSON.
    pub fn json_attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.config.json_attributes.contains(&name) {
            self.config.json_attributes.push(name);
        }
        self
    }

    /// Re-emit the `callback` prop as a DOM event called `event`.
    pub fn event(mut self, callback: impl Into<String>, event: impl Into<String>) -> Self {
        self.config.events.insert(callback.into(), event.into());
        self
    }

    /// Transform the payload of `callback` before it becomes the event detail.
    pub fn event_transform<F>(mut self, callback: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.config
            .event_transforms
            .insert(callback.into(), Rc::new(transform));
        self
    }

    pub fn shadow(mut self, shadow: bool) -> Self {
        self.config.shadow = shadow;
        self
    }

    /// Style text injected into the shadow root.
    pub fn styles(mut self, styles: impl Into<String>) -> Self {
        self.config.styles = Some(styles.into());
        self
    }

    /// Delay of the re-render scheduled on connect, `None` to skip it.
    pub fn deferred_render(mut self, delay: Option<Duration>) -> Self {
        self.config.deferred_render = delay;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<AdapterConfig<C>, ConfigError> {
        let config = self.config;

        validate_tag_name(&config.tag_name)?;

        for (attribute, prop) in &config.attributes {
            validate_attribute_name(attribute)?;
            if prop.trim().is_empty() {
                return Err(ConfigError::EmptyPropName(attribute.clone()));
            }
        }

        for (callback, event) in &config.events {
            if event.trim().is_empty() {
                return Err(ConfigError::EmptyEventName(callback.clone()));
            }
        }

        for name in &config.json_attributes {
            let known = config.attributes.contains_key(name)
                || config.attributes.values().any(|prop| prop == name);
            if !known {
                tracing::warn!(
                    tag = %config.tag_name,
                    name = %name,
                    "JSON attribute does not match any observed attribute"
                );
            }
        }

        for callback in config.event_transforms.keys() {
            if !config.events.contains_key(callback) {
                tracing::warn!(
                    tag = %config.tag_name,
                    callback = %callback,
                    "Event transform has no event mapping and will never run"
                );
            }
        }

        if config.styles.is_some() && !config.shadow {
            tracing::warn!(
                tag = %config.tag_name,
                "Styles are only injected when shadow DOM is enabled"
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_valid_tag_names() {
        for tag in ["packages-widget", "x-y", "my-el2", "a.b-c_d", "date-picker-widget"] {
            assert!(validate_tag_name(tag).is_ok(), "{tag} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_tag_names() {
        for tag in ["widget", "Packages-widget", "-widget", "1-widget", "my widget", ""] {
            assert_eq!(
                validate_tag_name(tag),
                Err(ConfigError::InvalidTagName(tag.to_string()))
            );
        }
    }

    #[test]
    fn rejects_reserved_tag_names() {
        assert_eq!(
            validate_tag_name("font-face"),
            Err(ConfigError::ReservedTagName("font-face".to_string()))
        );
    }

    #[test]
    fn rejects_uppercase_attribute_names() {
        let result = AdapterConfig::builder("trip-widget", ())
            .attribute("tripId", "tripId")
            .build();

        assert!(matches!(result, Err(ConfigError::InvalidAttributeName(_))));
    }

    #[test]
    fn rejects_empty_event_names() {
        let result = AdapterConfig::builder("trip-widget", ())
            .event("onClose", " ")
            .build();

        assert_eq!(
            result.unwrap_err(),
            ConfigError::EmptyEventName("onClose".to_string())
        );
    }

    #[test]
    fn observed_attributes_are_mapping_keys() {
        let config = AdapterConfig::builder("packages-widget", ())
            .attribute("translated-texts", "translatedTexts")
            .attribute("packages", "packages")
            .build()
            .unwrap();

        assert_eq!(
            config.observed_attributes(),
            vec!["packages".to_string(), "translated-texts".to_string()]
        );
        assert_eq!(config.prop_name("translated-texts"), Some("translatedTexts"));
        assert_eq!(config.prop_name("missing"), None);
    }

    #[test]
    fn json_list_matches_attribute_or_prop_name() {
        let config = AdapterConfig::builder("packages-widget", ())
            .attribute("packages", "packages")
            .attribute("translated-texts", "translatedTexts")
            .attribute("label", "label")
            .json_attribute("packages")
            .json_attribute("translatedTexts")
            .build()
            .unwrap();

        assert!(config.is_json_attribute("packages"));
        assert!(config.is_json_attribute("translated-texts"));
        assert!(!config.is_json_attribute("label"));
    }

    #[test]
    fn defaults_match_factory_defaults() {
        let config = AdapterConfig::builder("input-widget", ()).build().unwrap();

        assert!(config.shadow());
        assert_eq!(config.styles(), None);
        assert_eq!(config.deferred_render(), Some(DEFERRED_RENDER_DELAY));
        assert_eq!(config.anchor_id(), "input-widget-root");
        assert!(config.observed_attributes().is_empty());
    }
}
