//! Custom element adapter for view components.
//!
//! This crate turns a view component plus a declarative [`AdapterConfig`] into
//! a custom element class. The class drives one render root per element from
//! the connect, disconnect and attribute-change lifecycle callbacks, marshals
//! attributes into props and re-emits component callbacks as DOM events.
//!
//! The DOM, timers and the rendering framework are reached through the traits
//! in [`host`], so the same adapter runs against a browser binding or the
//! headless host in [`memory`].

pub mod config;
pub mod element;
pub mod host;
pub mod memory;
pub mod props;
pub mod registry;

pub use config::{
    validate_attribute_name, validate_tag_name, AdapterConfig, AdapterConfigBuilder, ConfigError,
    EventTransform, DEFERRED_RENDER_DELAY,
};
pub use element::{
    create_web_component, CustomElement, CustomElementConstructor, WebComponent,
    WebComponentClass,
};
pub use host::{CustomEvent, Dom, Host, NodeId, Query, RenderRoot, Renderer, Scheduler, TimerId};
pub use props::{parse_attribute, EventCallback, PropValue, Props};
pub use registry::{
    define_web_component, register_web_component, CustomElementRegistry, RegistryError,
};
