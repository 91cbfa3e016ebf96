//! Props handed to the render root.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::config::AdapterConfig;

/// A single prop value.
#[derive(Clone)]
pub enum PropValue {
    /// Attribute value: a string, or decoded JSON for JSON attributes.
    Data(Value),
    /// Callback that re-emits its argument as a DOM event.
    Callback(EventCallback),
}

impl PropValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            PropValue::Data(value) => Some(value),
            PropValue::Callback(_) => None,
        }
    }

    pub fn as_callback(&self) -> Option<&EventCallback> {
        match self {
            PropValue::Callback(callback) => Some(callback),
            PropValue::Data(_) => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            PropValue::Callback(callback) => f.debug_tuple("Callback").field(callback).finish(),
        }
    }
}

/// Callback prop bound to one element and one event name.
#[derive(Clone)]
pub struct EventCallback {
    event: String,
    handler: Rc<dyn Fn(Value)>,
}

impl EventCallback {
    pub fn new(event: impl Into<String>, handler: impl Fn(Value) + 'static) -> Self {
        Self {
            event: event.into(),
            handler: Rc::new(handler),
        }
    }

    /// Name of the DOM event this callback dispatches.
    pub fn event_name(&self) -> &str {
        &self.event
    }

    pub fn call(&self, data: Value) {
        (self.handler)(data)
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallback")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Props keyed by prop name.
#[derive(Debug, Clone, Default)]
pub struct Props {
    values: BTreeMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prop, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: PropValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn data(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(PropValue::as_data)
    }

    pub fn callback(&self, name: &str) -> Option<&EventCallback> {
        self.get(name).and_then(PropValue::as_callback)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Data props as a JSON object, callbacks left out.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .filter_map(|(name, value)| value.as_data().map(|v| (name.clone(), v.clone())))
                .collect(),
        )
    }
}

/// Convert a raw attribute value into a prop value.
///
/// An absent attribute has no value. JSON attributes that fail to parse are
/// reported and treated as absent; every other attribute passes through as a
/// string.
pub fn parse_attribute<C>(
    config: &AdapterConfig<C>,
    attribute: &str,
    raw: Option<&str>,
) -> Option<Value> {
    let raw = raw?;

    if !config.is_json_attribute(attribute) {
        return Some(Value::String(raw.to_string()));
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(
                tag = %config.tag_name(),
                attribute = %attribute,
                error = %e,
                "Failed to parse JSON attribute"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    fn config() -> AdapterConfig<()> {
        AdapterConfig::builder("packages-widget", ())
            .attribute("packages", "packages")
            .attribute("translated-texts", "translatedTexts")
            .attribute("label", "label")
            .json_attribute("packages")
            .json_attribute("translatedTexts")
            .build()
            .unwrap()
    }

    #[test]
    fn passes_plain_attributes_through() {
        let value = parse_attribute(&config(), "label", Some("{not json"));
        assert_eq!(value, Some(json!("{not json")));
    }

    #[test]
    fn absent_attribute_has_no_value() {
        assert_eq!(parse_attribute(&config(), "label", None), None);
        assert_eq!(parse_attribute(&config(), "packages", None), None);
    }

    #[test]
    fn decodes_json_attributes() {
        let value = parse_attribute(&config(), "packages", Some(r#"[{"id":1,"is_default":1}]"#));
        assert_eq!(value, Some(json!([{"id": 1, "is_default": 1}])));
    }

    #[test]
    fn decodes_json_attribute_listed_by_prop_name() {
        let value = parse_attribute(
            &config(),
            "translated-texts",
            Some(r#"{"view_details":"Details"}"#),
        );
        assert_eq!(value, Some(json!({"view_details": "Details"})));
    }

    #[test]
    fn malformed_json_is_dropped() {
        assert_eq!(parse_attribute(&config(), "packages", Some("[{")), None);
    }

    #[test]
    fn callbacks_forward_their_payload() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let callback = EventCallback::new("view-details", move |data| sink.borrow_mut().push(data));

        callback.call(json!({"id": 7}));

        assert_eq!(callback.event_name(), "view-details");
        assert_eq!(*seen.borrow(), vec![json!({"id": 7})]);
    }

    #[test]
    fn to_json_skips_callbacks() {
        let mut props = Props::new();
        props.insert("label", PropValue::Data(json!("Hi")));
        props.insert(
            "onClose",
            PropValue::Callback(EventCallback::new("close", |_| {})),
        );

        assert_eq!(props.len(), 2);
        assert_eq!(props.to_json(), json!({"label": "Hi"}));
    }
}
