//! Custom element registry.
//!
//! Stands in for the page's `customElements` object. Keeping it an explicit
//! value lets every test and every embedding own its registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::config::{validate_tag_name, AdapterConfig};
use crate::element::{create_web_component, CustomElementConstructor};
use crate::host::Renderer;

/// A registry of custom element definitions keyed by tag name.
#[derive(Default)]
pub struct CustomElementRegistry {
    definitions: RefCell<HashMap<String, Rc<dyn CustomElementConstructor>>>,
}

impl CustomElementRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the definition registered for `tag`.
    pub fn get(&self, tag: &str) -> Option<Rc<dyn CustomElementConstructor>> {
        self.definitions.borrow().get(tag).cloned()
    }

    /// Check if a tag is defined.
    pub fn contains(&self, tag: &str) -> bool {
        self.definitions.borrow().contains_key(tag)
    }

    /// Get all defined tag names, sorted.
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.borrow().is_empty()
    }

    /// Define `class` under its tag name.
    ///
    /// Like `customElements.define`, redefining a tag is an error.
    pub fn define(&self, class: Rc<dyn CustomElementConstructor>) -> Result<(), RegistryError> {
        let tag = class.tag_name().to_string();
        validate_tag_name(&tag).map_err(|_| RegistryError::InvalidName(tag.clone()))?;

        let mut definitions = self.definitions.borrow_mut();
        if definitions.contains_key(&tag) {
            return Err(RegistryError::AlreadyDefined(tag));
        }

        definitions.insert(tag, class);
        Ok(())
    }
}

impl fmt::Debug for CustomElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomElementRegistry")
            .field("tags", &self.tag_names())
            .finish()
    }
}

/// Errors that can occur with the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Custom element already defined: <{0}>")]
    AlreadyDefined(String),

    #[error("Invalid custom element name: {0}")]
    InvalidName(String),
}

/// Define `class` unless its tag is already taken.
///
/// Modules that define elements can be evaluated more than once (hot reload,
/// duplicate bundles), so a taken tag is not an error. Returns whether the
/// class was registered.
pub fn register_web_component(
    registry: &CustomElementRegistry,
    class: Rc<dyn CustomElementConstructor>,
) -> Result<bool, RegistryError> {
    if registry.contains(class.tag_name()) {
        tracing::debug!(tag = %class.tag_name(), "Custom element already registered");
        return Ok(false);
    }

    registry.define(Rc::clone(&class))?;
    tracing::debug!(tag = %class.tag_name(), "Custom element registered");
    Ok(true)
}

/// Create the element class for `config` and register it in one call.
pub fn define_web_component<C: 'static>(
    registry: &CustomElementRegistry,
    config: AdapterConfig<C>,
    renderer: Rc<dyn Renderer<C>>,
) -> Result<bool, RegistryError> {
    let class = create_web_component(config, renderer);
    register_web_component(registry, Rc::new(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{CustomElement, WebComponentClass};
    use crate::host::{Dom, Host, NodeId};
    use crate::memory::{MemoryPage, MemoryRenderer};
    use pretty_assertions::assert_eq;

    fn class(tag: &str) -> Rc<WebComponentClass<&'static str>> {
        let config = AdapterConfig::builder(tag, "Widget")
            .attribute("label", "label")
            .build()
            .unwrap();
        Rc::new(create_web_component(config, Rc::new(MemoryRenderer::new())))
    }

    struct Unnamed;

    impl CustomElementConstructor for Unnamed {
        fn tag_name(&self) -> &str {
            "unnamed"
        }

        fn observed_attributes(&self) -> Vec<String> {
            Vec::new()
        }

        fn construct(&self, _host: &Host, _element: NodeId) -> Rc<dyn CustomElement> {
            unreachable!("never registered")
        }
    }

    #[test]
    fn define_rejects_duplicates() {
        let registry = CustomElementRegistry::new();
        registry.define(class("input-widget")).unwrap();

        assert_eq!(
            registry.define(class("input-widget")),
            Err(RegistryError::AlreadyDefined("input-widget".to_string()))
        );
    }

    #[test]
    fn define_rejects_invalid_names() {
        let registry = CustomElementRegistry::new();

        assert_eq!(
            registry.define(Rc::new(Unnamed)),
            Err(RegistryError::InvalidName("unnamed".to_string()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn register_is_idempotent() {
        let registry = CustomElementRegistry::new();
        let first = class("checkbox-widget");
        let second = class("checkbox-widget");

        assert_eq!(register_web_component(&registry, first.clone()), Ok(true));
        assert_eq!(register_web_component(&registry, second), Ok(false));

        assert_eq!(registry.len(), 1);
        let registered = registry.get("checkbox-widget").unwrap();
        let first: Rc<dyn CustomElementConstructor> = first;
        assert!(Rc::ptr_eq(&registered, &first));
    }

    #[test]
    fn define_web_component_registers_once() {
        let registry = CustomElementRegistry::new();
        let renderer = Rc::new(MemoryRenderer::new());

        for _ in 0..2 {
            let config = AdapterConfig::builder("accordion-widget", "Accordion")
                .attribute("title", "title")
                .attribute("content", "content")
                .build()
                .unwrap();
            define_web_component(&registry, config, renderer.clone()).unwrap();
        }

        assert_eq!(registry.tag_names(), vec!["accordion-widget".to_string()]);
    }

    #[test]
    fn page_upgrades_registered_elements() {
        let page = MemoryPage::new();
        let renderer = MemoryRenderer::new();
        let config = AdapterConfig::builder("greeting-widget", "Greeting")
            .attribute("title", "title")
            .build()
            .unwrap();
        define_web_component(page.registry(), config, Rc::new(renderer.clone())).unwrap();

        let element = page.create_element("greeting-widget");
        page.set_attribute(element, "title", "Hello");
        page.connect(element);

        assert!(page.instance(element).is_some());
        assert!(page.dom().shadow_root(element).is_some());
        assert_eq!(
            renderer.last_props().unwrap().data("title"),
            Some(&serde_json::json!("Hello"))
        );
        assert!(page.dom().is_connected(element));
    }

    #[test]
    fn unregistered_tags_stay_plain() {
        let page = MemoryPage::new();
        let element = page.create_element("unknown-widget");

        page.connect(element);

        assert!(page.instance(element).is_none());
    }
}
