//! Custom element factory and lifecycle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::AdapterConfig;
use crate::host::{CustomEvent, Host, NodeId, Query, RenderRoot, Renderer, TimerId};
use crate::props::{parse_attribute, EventCallback, PropValue, Props};

/// Lifecycle callbacks the host invokes on a constructed element.
pub trait CustomElement {
    fn connected_callback(&self);

    fn disconnected_callback(&self);

    fn attribute_changed_callback(&self, name: &str, old_value: Option<&str>, new_value: Option<&str>);
}

/// What gets registered under a tag name.
pub trait CustomElementConstructor {
    fn tag_name(&self) -> &str;

    /// Attributes whose changes are reported to the element.
    fn observed_attributes(&self) -> Vec<String>;

    /// Construct the element state for the host node `element`.
    fn construct(&self, host: &Host, element: NodeId) -> Rc<dyn CustomElement>;
}

/// Create a custom element class that renders `config.component()` through
/// `renderer`.
pub fn create_web_component<C: 'static>(
    config: AdapterConfig<C>,
    renderer: Rc<dyn Renderer<C>>,
) -> WebComponentClass<C> {
    WebComponentClass {
        definition: Rc::new(Definition { config, renderer }),
    }
}

struct Definition<C> {
    config: AdapterConfig<C>,
    renderer: Rc<dyn Renderer<C>>,
}

/// Element class produced by [`create_web_component`].
pub struct WebComponentClass<C> {
    definition: Rc<Definition<C>>,
}

impl<C> WebComponentClass<C> {
    pub fn config(&self) -> &AdapterConfig<C> {
        &self.definition.config
    }
}

impl<C> Clone for WebComponentClass<C> {
    fn clone(&self) -> Self {
        Self {
            definition: Rc::clone(&self.definition),
        }
    }
}

impl<C> fmt::Debug for WebComponentClass<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebComponentClass")
            .field("config", &self.definition.config)
            .finish_non_exhaustive()
    }
}

impl<C: 'static> WebComponentClass<C> {
    /// Construct a concretely typed element; see [`CustomElementConstructor::construct`].
    pub fn instantiate(&self, host: &Host, element: NodeId) -> Rc<WebComponent<C>> {
        let config = &self.definition.config;

        let mount_point = if config.shadow() {
            host.dom.attach_shadow(element)
        } else {
            element
        };

        let anchor = host.dom.create_element("div");
        host.dom.set_attribute(anchor, "id", &config.anchor_id());
        host.dom.append_child(mount_point, anchor);

        Rc::new_cyclic(|this| WebComponent {
            this: this.clone(),
            definition: Rc::clone(&self.definition),
            host: host.clone(),
            element,
            mount_point,
            root: RefCell::new(None),
            rendering: Cell::new(false),
            rerender: Cell::new(false),
            unmount_pending: Cell::new(false),
            deferred_render: Cell::new(None),
        })
    }
}

impl<C: 'static> CustomElementConstructor for WebComponentClass<C> {
    fn tag_name(&self) -> &str {
        self.definition.config.tag_name()
    }

    fn observed_attributes(&self) -> Vec<String> {
        self.definition.config.observed_attributes()
    }

    fn construct(&self, host: &Host, element: NodeId) -> Rc<dyn CustomElement> {
        self.instantiate(host, element)
    }
}

/// State of one element instance.
pub struct WebComponent<C> {
    this: Weak<WebComponent<C>>,
    definition: Rc<Definition<C>>,
    host: Host,
    element: NodeId,
    mount_point: NodeId,
    /// Checked out while a render is running.
    root: RefCell<Option<Box<dyn RenderRoot<C>>>>,
    rendering: Cell<bool>,
    rerender: Cell<bool>,
    unmount_pending: Cell<bool>,
    deferred_render: Cell<Option<TimerId>>,
}

impl<C: 'static> WebComponent<C> {
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The shadow root, or the element itself without shadow DOM.
    pub fn mount_point(&self) -> NodeId {
        self.mount_point
    }

    /// Whether a render root is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.rendering.get() || self.root.borrow().is_some()
    }

    /// Whether the connect-time re-render is still pending.
    pub fn has_pending_render(&self) -> bool {
        self.deferred_render.get().is_some()
    }

    fn tag(&self) -> &str {
        self.definition.config.tag_name()
    }

    /// Props from attributes followed by event callbacks.
    pub fn props(&self) -> Props {
        let config = &self.definition.config;
        let mut props = Props::new();

        for (attribute, prop) in config.attributes() {
            let raw = self.host.dom.get_attribute(self.element, attribute);
            if let Some(value) = parse_attribute(config, attribute, raw.as_deref()) {
                props.insert(prop, PropValue::Data(value));
            }
        }

        for (callback, event) in config.events() {
            props.insert(callback, PropValue::Callback(self.event_callback(callback, event)));
        }

        props
    }

    fn event_callback(&self, callback: &str, event: &str) -> EventCallback {
        let this = self.this.clone();
        let transform = self.definition.config.event_transform(callback).cloned();
        let composed = self.definition.config.shadow();
        let name = event.to_string();

        EventCallback::new(event, move |data| {
            let Some(element) = this.upgrade() else {
                return;
            };

            let detail = match &transform {
                Some(transform) => transform(data),
                None => data,
            };

            tracing::debug!(tag = %element.tag(), event = %name, "Dispatching event");

            element.host.dom.dispatch_event(
                element.element,
                CustomEvent {
                    name: name.clone(),
                    detail,
                    bubbles: true,
                    composed,
                },
            );
        })
    }

    /// Append the configured styles to the shadow root once.
    pub fn inject_styles(&self) {
        let config = &self.definition.config;
        if !config.shadow() {
            return;
        }
        let Some(styles) = config.styles() else {
            return;
        };

        let dom = &self.host.dom;
        let marker = Query::StyleMarker(config.tag_name().to_string());
        if dom.query(self.mount_point, &marker).is_some() {
            return;
        }

        let style = dom.create_element("style");
        dom.set_attribute(style, "data-widget", config.tag_name());
        dom.set_text_content(style, styles);
        dom.append_child(self.mount_point, style);

        tracing::debug!(tag = %self.tag(), "Injected styles");
    }

    /// Render the component into the anchor, mounting a root on first use.
    ///
    /// The renderer may call back into the element. A render requested from
    /// inside a render runs once the current one returns, and a disconnect
    /// from inside a render unmounts the root once it returns.
    pub fn render(&self) {
        if self.rendering.get() {
            tracing::debug!(tag = %self.tag(), "Render requested while rendering");
            self.unmount_pending.set(false);
            self.rerender.set(true);
            return;
        }

        let config = &self.definition.config;
        let anchor_id = config.anchor_id();

        let Some(anchor) = self.host.dom.query(self.mount_point, &Query::Id(anchor_id.clone()))
        else {
            tracing::error!(tag = %self.tag(), container = %anchor_id, "Render container not found");
            return;
        };

        let existing = self.root.borrow_mut().take();
        let mut root = existing.unwrap_or_else(|| {
            tracing::debug!(tag = %self.tag(), "Created render root");
            self.definition.renderer.create_root(anchor)
        });

        self.rendering.set(true);
        self.unmount_pending.set(false);
        loop {
            self.rerender.set(false);

            let props = self.props();
            tracing::debug!(tag = %self.tag(), props = ?props.names().collect::<Vec<_>>(), "Rendering");
            root.render(config.component(), props);

            if self.unmount_pending.get() || !self.rerender.get() {
                break;
            }
        }
        self.rendering.set(false);
        self.rerender.set(false);

        if self.unmount_pending.replace(false) {
            root.unmount();
            tracing::debug!(tag = %self.tag(), "Unmounted render root");
        } else {
            *self.root.borrow_mut() = Some(root);
        }
    }

    fn schedule_deferred_render(&self) {
        let Some(delay) = self.definition.config.deferred_render() else {
            return;
        };

        self.cancel_deferred_render();

        let this = self.this.clone();
        let id = self.host.scheduler.set_timeout(
            delay,
            Box::new(move || {
                if let Some(element) = this.upgrade() {
                    element.run_deferred_render();
                }
            }),
        );
        self.deferred_render.set(Some(id));
    }

    fn cancel_deferred_render(&self) {
        if let Some(id) = self.deferred_render.take() {
            self.host.scheduler.clear_timeout(id);
        }
    }

    fn run_deferred_render(&self) {
        self.deferred_render.set(None);

        if self.host.dom.is_connected(self.element) {
            tracing::debug!(tag = %self.tag(), "Deferred render");
            self.render();
        } else {
            tracing::debug!(tag = %self.tag(), "Skipping deferred render for detached element");
        }
    }

    fn unmount(&self) {
        if self.rendering.get() {
            self.unmount_pending.set(true);
            return;
        }
        let root = self.root.borrow_mut().take();
        if let Some(mut root) = root {
            root.unmount();
            tracing::debug!(tag = %self.tag(), "Unmounted render root");
        }
    }
}

impl<C: 'static> CustomElement for WebComponent<C> {
    fn connected_callback(&self) {
        tracing::debug!(tag = %self.tag(), "Connected");
        self.inject_styles();
        self.render();
        if self.host.dom.is_connected(self.element) {
            self.schedule_deferred_render();
        }
    }

    fn disconnected_callback(&self) {
        tracing::debug!(tag = %self.tag(), "Disconnected");
        self.cancel_deferred_render();
        self.unmount();
    }

    fn attribute_changed_callback(&self, name: &str, old_value: Option<&str>, new_value: Option<&str>) {
        if old_value == new_value {
            return;
        }
        // Attributes set before insertion are picked up by the connect render.
        if !self.host.dom.is_connected(self.element) {
            tracing::debug!(tag = %self.tag(), attribute = %name, "Attribute changed while detached");
            return;
        }
        self.render();
    }
}

impl<C> Drop for WebComponent<C> {
    fn drop(&mut self) {
        if let Some(id) = self.deferred_render.take() {
            self.host.scheduler.clear_timeout(id);
        }
        if let Some(mut root) = self.root.get_mut().take() {
            root.unmount();
        }
    }
}

impl<C> fmt::Debug for WebComponent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebComponent")
            .field("tag", &self.definition.config.tag_name())
            .field("element", &self.element)
            .field("mount_point", &self.mount_point)
            .field("mounted", &(self.rendering.get() || self.root.borrow().is_some()))
            .field("deferred_render", &self.deferred_render.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Dom;
    use crate::memory::{MemoryPage, MemoryRenderer};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;

    const STYLES: &str = ":host { display: block; }";

    fn packages_config() -> AdapterConfig<&'static str> {
        AdapterConfig::builder("packages-widget", "Packages")
            .attribute("packages", "packages")
            .attribute("translated-texts", "translatedTexts")
            .attribute("label", "label")
            .json_attribute("packages")
            .json_attribute("translatedTexts")
            .event("onViewDetails", "view-details")
            .styles(STYLES)
            .build()
            .unwrap()
    }

    fn mount(config: AdapterConfig<&'static str>) -> (MemoryPage, MemoryRenderer, Rc<WebComponent<&'static str>>, NodeId) {
        let page = MemoryPage::new();
        let renderer = MemoryRenderer::new();
        let class = create_web_component(config, Rc::new(renderer.clone()));
        let element = page.dom().create_element(class.config().tag_name());
        let instance = class.instantiate(&page.host(), element);
        page.adopt(element, &class, instance.clone());
        (page, renderer, instance, element)
    }

    #[test]
    fn observed_attributes_equal_mapping_keys() {
        let class = create_web_component(packages_config(), Rc::new(MemoryRenderer::new()));

        assert_eq!(
            class.observed_attributes(),
            vec!["label", "packages", "translated-texts"]
        );
        assert_eq!(class.tag_name(), "packages-widget");
    }

    #[test]
    fn construction_creates_anchor_without_rendering() {
        let (page, renderer, instance, element) = mount(packages_config());

        let shadow = page.dom().shadow_root(element).unwrap();
        assert_eq!(instance.mount_point(), shadow);
        assert!(page
            .dom()
            .query(shadow, &Query::Id("packages-widget-root".into()))
            .is_some());
        assert_eq!(renderer.roots_created(), 0);
        assert!(!instance.is_mounted());
    }

    #[test]
    fn light_dom_mounts_into_element() {
        let config = AdapterConfig::builder("input-widget", "Input")
            .shadow(false)
            .build()
            .unwrap();
        let (page, _, instance, element) = mount(config);

        assert_eq!(instance.mount_point(), element);
        assert_eq!(page.dom().shadow_root(element), None);
    }

    #[test]
    fn connect_renders_attribute_props() {
        let (page, renderer, _, element) = mount(packages_config());
        page.set_attribute(element, "label", "Choose");
        page.set_attribute(element, "packages", r#"[{"id":1}]"#);

        page.connect(element);

        let props = renderer.last_props().unwrap();
        assert_eq!(props.data("label"), Some(&json!("Choose")));
        assert_eq!(props.data("packages"), Some(&json!([{"id": 1}])));
        assert!(!props.contains("translatedTexts"));
        assert!(props.callback("onViewDetails").is_some());
        assert_eq!(renderer.roots_created(), 1);
        assert_eq!(renderer.renders(), 1);
    }

    #[test]
    fn invalid_json_attribute_omits_prop() {
        let (page, renderer, _, element) = mount(packages_config());
        page.connect(element);

        page.set_attribute(element, "packages", "[{broken");

        let props = renderer.last_props().unwrap();
        assert!(!props.contains("packages"));
        assert_eq!(renderer.renders(), 2);
    }

    #[test]
    fn attribute_change_rerenders_only_on_difference() {
        let (page, renderer, instance, element) = mount(packages_config());
        page.set_attribute(element, "label", "One");
        page.connect(element);

        instance.attribute_changed_callback("label", Some("One"), Some("One"));
        assert_eq!(renderer.renders(), 1);

        page.set_attribute(element, "label", "Two");
        assert_eq!(renderer.renders(), 2);
        assert_eq!(renderer.last_props().unwrap().data("label"), Some(&json!("Two")));

        page.remove_attribute(element, "label");
        assert_eq!(renderer.renders(), 3);
        assert!(!renderer.last_props().unwrap().contains("label"));
    }

    #[test]
    fn attribute_change_before_connect_does_not_mount() {
        let (page, renderer, _, element) = mount(packages_config());

        page.set_attribute(element, "label", "Early");

        assert_eq!(renderer.roots_created(), 0);
        page.connect(element);
        assert_eq!(renderer.last_props().unwrap().data("label"), Some(&json!("Early")));
    }

    #[test]
    fn reconnecting_keeps_a_single_live_root() {
        let (page, renderer, instance, element) = mount(packages_config());

        page.connect(element);
        page.disconnect(element);
        page.connect(element);
        assert_eq!(renderer.live_roots(), 1);
        page.disconnect(element);
        page.connect(element);

        assert_eq!(renderer.live_roots(), 1);
        assert_eq!(renderer.roots_created(), 3);
        assert!(instance.is_mounted());
    }

    #[test]
    fn rerender_reuses_root() {
        let (page, renderer, _, element) = mount(packages_config());
        page.connect(element);

        page.set_attribute(element, "label", "a");
        page.set_attribute(element, "label", "b");

        assert_eq!(renderer.roots_created(), 1);
        assert_eq!(renderer.renders(), 3);
    }

    #[test]
    fn disconnect_is_idempotent_and_safe_before_connect() {
        let (page, renderer, instance, _) = mount(packages_config());

        instance.disconnected_callback();
        instance.disconnected_callback();

        assert_eq!(renderer.live_roots(), 0);
        assert_eq!(page.scheduler().pending(), 0);
    }

    #[test]
    fn callback_dispatches_event_with_payload() {
        let (page, renderer, _, element) = mount(packages_config());
        page.connect(element);

        let props = renderer.last_props().unwrap();
        props.callback("onViewDetails").unwrap().call(json!({"x": 1}));

        let events = page.dom().events(element);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            CustomEvent {
                name: "view-details".to_string(),
                detail: json!({"x": 1}),
                bubbles: true,
                composed: true,
            }
        );
    }

    #[test]
    fn callback_applies_transform() {
        let config = AdapterConfig::builder("counter-widget", "Counter")
            .event("onChange", "change")
            .event_transform("onChange", |mut data: Value| {
                if let Some(n) = data.get("n").and_then(Value::as_i64) {
                    data["n"] = json!(n * 2);
                }
                data
            })
            .build()
            .unwrap();
        let (page, renderer, _, element) = mount(config);
        page.connect(element);

        renderer
            .last_props()
            .unwrap()
            .callback("onChange")
            .unwrap()
            .call(json!({"n": 2}));

        let events = page.dom().events(element);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail["n"], json!(4));
    }

    #[test]
    fn light_dom_events_are_not_composed() {
        let config = AdapterConfig::builder("packages-widget", "Packages")
            .event("onViewDetails", "view-details")
            .shadow(false)
            .build()
            .unwrap();
        let (page, renderer, _, element) = mount(config);
        page.connect(element);

        renderer
            .last_props()
            .unwrap()
            .callback("onViewDetails")
            .unwrap()
            .call(json!(null));

        let events = page.dom().events(element);
        assert!(events[0].bubbles);
        assert!(!events[0].composed);
    }

    #[test]
    fn callback_outliving_element_is_noop() {
        let (page, renderer, instance, element) = mount(packages_config());
        page.connect(element);
        let callback = renderer.last_props().unwrap().callback("onViewDetails").unwrap().clone();

        page.forget(element);
        drop(instance);
        callback.call(json!({"x": 1}));

        assert!(page.dom().events(element).is_empty());
    }

    #[test]
    fn styles_injected_once_across_connect_cycles() {
        let (page, _, _, element) = mount(packages_config());

        page.connect(element);
        page.disconnect(element);
        page.connect(element);

        let shadow = page.dom().shadow_root(element).unwrap();
        let styles = page
            .dom()
            .query_all(shadow, &Query::StyleMarker("packages-widget".into()));
        assert_eq!(styles.len(), 1);
        assert_eq!(page.dom().text_content(styles[0]), STYLES);
    }

    #[test]
    fn styles_skipped_without_shadow_dom() {
        let config = AdapterConfig::builder("packages-widget", "Packages")
            .styles(STYLES)
            .shadow(false)
            .build()
            .unwrap();
        let (page, _, _, element) = mount(config);

        page.connect(element);

        assert!(page
            .dom()
            .query_all(element, &Query::StyleMarker("packages-widget".into()))
            .is_empty());
    }

    #[test]
    fn missing_anchor_skips_render() {
        let (page, renderer, instance, element) = mount(packages_config());
        let anchor = page
            .dom()
            .query(instance.mount_point(), &Query::Id("packages-widget-root".into()))
            .unwrap();
        page.dom().remove(anchor);

        page.connect(element);

        assert_eq!(renderer.roots_created(), 0);
        assert!(!instance.is_mounted());
    }

    #[test]
    fn deferred_render_fires_once_while_connected() {
        let (page, renderer, instance, element) = mount(packages_config());
        page.connect(element);
        assert!(instance.has_pending_render());

        page.advance(Duration::from_millis(99));
        assert_eq!(renderer.renders(), 1);

        page.advance(Duration::from_millis(1));
        assert_eq!(renderer.renders(), 2);
        assert!(!instance.has_pending_render());

        page.advance(Duration::from_secs(1));
        assert_eq!(renderer.renders(), 2);
    }

    #[test]
    fn deferred_render_cancelled_by_disconnect() {
        let (page, renderer, instance, element) = mount(packages_config());
        page.connect(element);
        page.disconnect(element);

        assert!(!instance.has_pending_render());
        page.advance(Duration::from_secs(1));

        assert_eq!(renderer.renders(), 1);
        assert_eq!(renderer.live_roots(), 0);
    }

    #[test]
    fn deferred_render_checks_connection_when_fired() {
        let (page, renderer, _, element) = mount(packages_config());
        page.connect(element);

        // Detach without running the disconnect callback.
        page.dom().remove(element);
        page.advance(DEFERRED_DELAY);

        assert_eq!(renderer.renders(), 1);
    }

    #[test]
    fn reconnect_replaces_pending_deferred_render() {
        let (page, renderer, _, element) = mount(packages_config());
        page.connect(element);
        page.disconnect(element);
        page.connect(element);

        assert_eq!(page.scheduler().pending(), 1);
        page.advance(DEFERRED_DELAY);
        assert_eq!(renderer.renders(), 3);
    }

    #[test]
    fn deferred_render_can_be_disabled() {
        let config = AdapterConfig::builder("input-widget", "Input")
            .deferred_render(None)
            .build()
            .unwrap();
        let (page, renderer, instance, element) = mount(config);

        page.connect(element);

        assert!(!instance.has_pending_render());
        assert_eq!(page.scheduler().pending(), 0);
        assert_eq!(renderer.renders(), 1);
    }

    /// Renderer that runs `hook` with the props of every render.
    struct HookRenderer {
        inner: MemoryRenderer,
        hook: Rc<dyn Fn(&Props)>,
    }

    struct HookRoot<C> {
        inner: Box<dyn RenderRoot<C>>,
        hook: Rc<dyn Fn(&Props)>,
    }

    impl<C: 'static> Renderer<C> for HookRenderer {
        fn create_root(&self, container: NodeId) -> Box<dyn RenderRoot<C>> {
            Box::new(HookRoot {
                inner: Renderer::<C>::create_root(&self.inner, container),
                hook: Rc::clone(&self.hook),
            })
        }
    }

    impl<C> RenderRoot<C> for HookRoot<C> {
        fn render(&mut self, component: &C, props: Props) {
            self.inner.render(component, props.clone());
            (self.hook)(&props);
        }

        fn unmount(&mut self) {
            self.inner.unmount();
        }
    }

    fn mount_with_hook(
        hook: impl Fn(&MemoryPage, NodeId, &Props) + 'static,
    ) -> (Rc<MemoryPage>, MemoryRenderer, Rc<WebComponent<&'static str>>, NodeId) {
        let config = AdapterConfig::builder("counter-widget", "Counter")
            .attribute("value", "value")
            .event("onChange", "change")
            .build()
            .unwrap();

        let page = Rc::new(MemoryPage::new());
        let element = page.dom().create_element("counter-widget");
        let weak_page = Rc::downgrade(&page);
        let renderer = MemoryRenderer::new();
        let hooked = HookRenderer {
            inner: renderer.clone(),
            hook: Rc::new(move |props: &Props| {
                if let Some(page) = weak_page.upgrade() {
                    hook(&page, element, props);
                }
            }),
        };

        let class = create_web_component(config, Rc::new(hooked));
        let instance = class.instantiate(&page.host(), element);
        page.adopt(element, &class, instance.clone());
        (page, renderer, instance, element)
    }

    #[test]
    fn attribute_change_during_render_rerenders_after_it() {
        let (page, renderer, instance, element) = mount_with_hook(|page, element, props| {
            if let Some(on_change) = props.callback("onChange") {
                on_change.call(json!({"value": 1}));
            }
            page.set_attribute(element, "value", "1");
        });

        page.connect(element);

        assert_eq!(renderer.roots_created(), 1);
        assert_eq!(renderer.live_roots(), 1);
        assert_eq!(renderer.renders(), 2);
        assert_eq!(renderer.last_props().unwrap().data("value"), Some(&json!("1")));
        assert_eq!(page.dom().events(element).len(), 2);
        assert!(instance.is_mounted());
    }

    #[test]
    fn disconnect_during_render_unmounts_after_it() {
        let (page, renderer, instance, element) = mount_with_hook(|page, element, _| {
            if page.dom().is_connected(element) {
                page.disconnect(element);
            }
        });

        page.connect(element);

        assert_eq!(renderer.roots_created(), 1);
        assert_eq!(renderer.live_roots(), 0);
        assert!(!instance.is_mounted());
        assert!(!instance.has_pending_render());

        page.connect(element);
        assert_eq!(renderer.live_roots(), 0);
        assert_eq!(renderer.roots_created(), 2);
    }

    const DEFERRED_DELAY: Duration = crate::config::DEFERRED_RENDER_DELAY;
}
