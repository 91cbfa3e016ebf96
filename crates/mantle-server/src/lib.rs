//! Development server for mantle widgets.
//!
//! Serves generated widget modules to any origin, rebuilds them when a
//! widget directory changes, and tells open pages to reload.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{default_imports, DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{HmrHub, HmrMessage};
