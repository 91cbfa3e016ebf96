//! Host environment seams.
//!
//! The adapter never touches a concrete DOM or framework. A browser binding
//! implements these traits over the real document; [`crate::memory`] provides
//! a headless implementation.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::props::Props;

/// Opaque handle to a node owned by a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Handle returned by [`Scheduler::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// A DOM `CustomEvent` as dispatched by an element.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    pub name: String,
    pub detail: Value,
    pub bubbles: bool,
    /// Crosses shadow boundaries.
    pub composed: bool,
}

/// Structured subset of `querySelector` the adapter relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `#id`
    Id(String),
    /// `style[data-widget="tag"]`
    StyleMarker(String),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Id(id) => write!(f, "#{id}"),
            Query::StyleMarker(tag) => write!(f, "style[data-widget=\"{tag}\"]"),
        }
    }
}

/// Document operations needed by the element lifecycle.
///
/// Methods take `&self`; implementations use interior mutability the way a
/// browser document does.
pub trait Dom {
    fn get_attribute(&self, element: NodeId, name: &str) -> Option<String>;

    /// Whether `node` is reachable from the document, through shadow hosts.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Attach an open shadow root to `element` and return it.
    fn attach_shadow(&self, element: NodeId) -> NodeId;

    fn create_element(&self, tag: &str) -> NodeId;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn set_text_content(&self, node: NodeId, text: &str);

    fn append_child(&self, parent: NodeId, child: NodeId);

    /// First descendant of `root` matching `query`, not crossing shadow roots.
    fn query(&self, root: NodeId, query: &Query) -> Option<NodeId>;

    fn dispatch_event(&self, target: NodeId, event: CustomEvent);
}

/// One-shot timers.
pub trait Scheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancel a pending timer. Unknown or already fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

/// Framework entry point that mounts component trees into containers.
pub trait Renderer<C> {
    fn create_root(&self, container: NodeId) -> Box<dyn RenderRoot<C>>;
}

/// A mounted component tree.
pub trait RenderRoot<C> {
    /// Render `component` with `props`, reconciling against the previous render.
    fn render(&mut self, component: &C, props: Props);

    fn unmount(&mut self);
}

/// The document and timer source an element is constructed against.
#[derive(Clone)]
pub struct Host {
    pub dom: Rc<dyn Dom>,
    pub scheduler: Rc<dyn Scheduler>,
}

impl Host {
    pub fn new(dom: Rc<dyn Dom>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self { dom, scheduler }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_render_as_selectors() {
        assert_eq!(Query::Id("input-widget-root".into()).to_string(), "#input-widget-root");
        assert_eq!(
            Query::StyleMarker("input-widget".into()).to_string(),
            r#"style[data-widget="input-widget"]"#
        );
    }
}
