//! WebSocket-based reload notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// Widgets were rebuilt
    Rebuilt {
        /// Tags of the rebuilt widgets
        tags: Vec<String>,
    },

    /// A rebuild failed; pages keep their current modules
    BuildFailed { message: String },
}

/// Hub for broadcasting messages to all connected pages.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<HmrMessage>,
}

impl HmrHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected pages.
    pub fn send(&self, msg: HmrMessage) {
        // No receivers is fine.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Client script that reloads the page after a rebuild.
///
/// Generated modules register their element only once per page, so a fresh
/// module cannot replace a live definition; a reload is the only way to pick
/// up new code.
pub fn hmr_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{ws_path}';
  const ws = new WebSocket(url);

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'rebuilt':
        console.log('[mantle] Rebuilt', msg.tags.join(', '));
        location.reload();
        break;

      case 'build_failed':
        console.error('[mantle] Build failed:', msg.message);
        break;

      case 'connected':
        console.log('[mantle] Connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[mantle] Disconnected');
  }};
}})();
"#
    )
}
