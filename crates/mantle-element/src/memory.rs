//! Headless host.
//!
//! [`MemoryDom`] is a small node tree with shadow roots and an event log,
//! [`ManualScheduler`] a clock that only moves when told to, and
//! [`MemoryRenderer`] a renderer that records what it was asked to do.
//! [`MemoryPage`] ties them to a [`CustomElementRegistry`] and invokes the
//! lifecycle callbacks the way a browser would.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use crate::element::{CustomElement, CustomElementConstructor};
use crate::host::{CustomEvent, Dom, Host, NodeId, Query, RenderRoot, Renderer, Scheduler, TimerId};
use crate::props::Props;
use crate::registry::CustomElementRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Document,
    Element(String),
    ShadowRoot { host: NodeId },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    shadow_root: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            shadow_root: None,
        }
    }

    fn matches(&self, query: &Query) -> bool {
        match query {
            Query::Id(id) => self.attributes.get("id") == Some(id),
            Query::StyleMarker(tag) => {
                self.kind == NodeKind::Element("style".to_string())
                    && self.attributes.get("data-widget") == Some(tag)
            }
        }
    }
}

/// In-memory document.
#[derive(Debug)]
pub struct MemoryDom {
    nodes: RefCell<Vec<NodeData>>,
    events: RefCell<Vec<(NodeId, CustomEvent)>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Create a document with an empty body.
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![NodeData::new(NodeKind::Document)]),
            events: RefCell::new(Vec::new()),
        }
    }

    /// The node connected elements are appended to.
    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    fn index(node: NodeId) -> usize {
        node.0 as usize
    }

    /// Detach `node` from its parent. The subtree stays intact.
    pub fn remove(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(parent) = nodes[Self::index(node)].parent.take() else {
            return;
        };
        nodes[Self::index(parent)].children.retain(|child| *child != node);
    }

    pub fn shadow_root(&self, element: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[Self::index(element)].shadow_root
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[Self::index(node)].children.clone()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.nodes.borrow()[Self::index(node)].kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.nodes.borrow()[Self::index(node)].text.clone()
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        self.nodes.borrow_mut()[Self::index(node)]
            .attributes
            .remove(name);
    }

    /// Every descendant of `root` matching `query`, in tree order.
    pub fn query_all(&self, root: NodeId, query: &Query) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = nodes[Self::index(root)].children.iter().rev().copied().collect();

        while let Some(node) = stack.pop() {
            let data = &nodes[Self::index(node)];
            if data.matches(query) {
                found.push(node);
            }
            stack.extend(data.children.iter().rev().copied());
        }

        found
    }

    /// Events dispatched on `target`, oldest first.
    pub fn events(&self, target: NodeId) -> Vec<CustomEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|(node, _)| *node == target)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Drain the whole event log.
    pub fn take_events(&self) -> Vec<(NodeId, CustomEvent)> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    fn push(&self, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        NodeId((nodes.len() - 1) as u64)
    }
}

impl Dom for MemoryDom {
    fn get_attribute(&self, element: NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[Self::index(element)]
            .attributes
            .get(name)
            .cloned()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = node;
        loop {
            let data = &nodes[Self::index(current)];
            match (&data.kind, data.parent) {
                (NodeKind::Document, _) => return true,
                (NodeKind::ShadowRoot { host }, _) => current = *host,
                (_, Some(parent)) => current = parent,
                (_, None) => return false,
            }
        }
    }

    /// Returns the existing shadow root when one is already attached.
    fn attach_shadow(&self, element: NodeId) -> NodeId {
        if let Some(shadow) = self.shadow_root(element) {
            return shadow;
        }
        let shadow = self.push(NodeData::new(NodeKind::ShadowRoot { host: element }));
        self.nodes.borrow_mut()[Self::index(element)].shadow_root = Some(shadow);
        shadow
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Element(tag.to_ascii_lowercase())))
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.nodes.borrow_mut()[Self::index(node)]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        self.nodes.borrow_mut()[Self::index(node)].text = text.to_string();
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        self.remove(child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[Self::index(child)].parent = Some(parent);
        nodes[Self::index(parent)].children.push(child);
    }

    fn query(&self, root: NodeId, query: &Query) -> Option<NodeId> {
        self.query_all(root, query).into_iter().next()
    }

    fn dispatch_event(&self, target: NodeId, event: CustomEvent) {
        self.events.borrow_mut().push((target, event));
    }
}

/// Scheduler driven by [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    timers: RefCell<BTreeMap<(Duration, u64), Box<dyn FnOnce()>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of timers that have neither fired nor been cleared.
    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Move the clock forward by `by`, firing due timers in order.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;

        loop {
            let due = {
                let mut timers = self.timers.borrow_mut();
                let next = timers.first_key_value().map(|(&(at, _), _)| at);
                match next {
                    Some(at) if at <= target => timers.pop_first(),
                    _ => None,
                }
            };
            let Some(((at, _), callback)) = due else {
                break;
            };
            self.now.set(at);
            callback();
        }

        self.now.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.timers
            .borrow_mut()
            .insert((self.now.get() + delay, id), callback);
        TimerId(id)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|&(_, timer), _| timer != id.0);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

#[derive(Debug, Default)]
struct RenderLog {
    roots_created: Cell<usize>,
    live_roots: Cell<usize>,
    renders: Cell<usize>,
    last_container: Cell<Option<NodeId>>,
    last_props: RefCell<Option<Props>>,
}

/// Renderer that records root creation, renders and unmounts.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    log: Rc<RenderLog>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots_created(&self) -> usize {
        self.log.roots_created.get()
    }

    /// Roots created and not yet unmounted.
    pub fn live_roots(&self) -> usize {
        self.log.live_roots.get()
    }

    pub fn renders(&self) -> usize {
        self.log.renders.get()
    }

    pub fn last_container(&self) -> Option<NodeId> {
        self.log.last_container.get()
    }

    pub fn last_props(&self) -> Option<Props> {
        self.log.last_props.borrow().clone()
    }
}

impl<C> Renderer<C> for MemoryRenderer {
    fn create_root(&self, container: NodeId) -> Box<dyn RenderRoot<C>> {
        let log = &self.log;
        log.roots_created.set(log.roots_created.get() + 1);
        log.live_roots.set(log.live_roots.get() + 1);
        Box::new(MemoryRoot {
            log: Rc::clone(log),
            container,
            mounted: true,
        })
    }
}

struct MemoryRoot {
    log: Rc<RenderLog>,
    container: NodeId,
    mounted: bool,
}

impl<C> RenderRoot<C> for MemoryRoot {
    fn render(&mut self, _component: &C, props: Props) {
        self.log.renders.set(self.log.renders.get() + 1);
        self.log.last_container.set(Some(self.container));
        *self.log.last_props.borrow_mut() = Some(props);
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            self.log.live_roots.set(self.log.live_roots.get() - 1);
        }
    }
}

struct Upgraded {
    observed: Vec<String>,
    instance: Rc<dyn CustomElement>,
}

/// A page that drives custom elements through their lifecycle.
pub struct MemoryPage {
    dom: Rc<MemoryDom>,
    scheduler: Rc<ManualScheduler>,
    registry: CustomElementRegistry,
    elements: RefCell<HashMap<NodeId, Upgraded>>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        Self {
            dom: Rc::new(MemoryDom::new()),
            scheduler: Rc::new(ManualScheduler::new()),
            registry: CustomElementRegistry::new(),
            elements: RefCell::new(HashMap::new()),
        }
    }

    pub fn dom(&self) -> &MemoryDom {
        &self.dom
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &CustomElementRegistry {
        &self.registry
    }

    /// Host handle elements on this page are constructed against.
    pub fn host(&self) -> Host {
        Host::new(self.dom.clone(), self.scheduler.clone())
    }

    /// Create an element, constructing it when `tag` is registered.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let element = self.dom.create_element(tag);
        if let Some(class) = self.registry.get(tag) {
            let instance = class.construct(&self.host(), element);
            self.adopt(element, class.as_ref(), instance);
        }
        element
    }

    /// Attach an already constructed element instance to `element`.
    pub fn adopt(
        &self,
        element: NodeId,
        class: &dyn CustomElementConstructor,
        instance: Rc<dyn CustomElement>,
    ) {
        self.elements.borrow_mut().insert(
            element,
            Upgraded {
                observed: class.observed_attributes(),
                instance,
            },
        );
    }

    /// Drop the page's reference to the instance behind `element`.
    pub fn forget(&self, element: NodeId) {
        self.elements.borrow_mut().remove(&element);
    }

    pub fn instance(&self, element: NodeId) -> Option<Rc<dyn CustomElement>> {
        self.elements
            .borrow()
            .get(&element)
            .map(|upgraded| Rc::clone(&upgraded.instance))
    }

    fn observing(&self, element: NodeId, name: &str) -> Option<Rc<dyn CustomElement>> {
        self.elements
            .borrow()
            .get(&element)
            .filter(|upgraded| upgraded.observed.iter().any(|attr| attr == name))
            .map(|upgraded| Rc::clone(&upgraded.instance))
    }

    pub fn set_attribute(&self, element: NodeId, name: &str, value: &str) {
        let old = self.dom.get_attribute(element, name);
        self.dom.set_attribute(element, name, value);
        if let Some(instance) = self.observing(element, name) {
            instance.attribute_changed_callback(name, old.as_deref(), Some(value));
        }
    }

    pub fn remove_attribute(&self, element: NodeId, name: &str) {
        let old = self.dom.get_attribute(element, name);
        self.dom.remove_attribute(element, name);
        if let Some(instance) = self.observing(element, name) {
            instance.attribute_changed_callback(name, old.as_deref(), None);
        }
    }

    /// Insert `element` into the body and run its connect callback.
    pub fn connect(&self, element: NodeId) {
        self.dom.append_child(self.dom.body(), element);
        if let Some(instance) = self.instance(element) {
            instance.connected_callback();
        }
    }

    /// Remove `element` from the document and run its disconnect callback.
    pub fn disconnect(&self, element: NodeId) {
        self.dom.remove(element);
        if let Some(instance) = self.instance(element) {
            instance.disconnected_callback();
        }
    }

    pub fn advance(&self, by: Duration) {
        self.scheduler.advance(by);
    }
}

impl std::fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPage")
            .field("elements", &self.elements.borrow().len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
