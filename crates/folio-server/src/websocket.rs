//! WebSocket-based hot reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to clients for hot reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// The site was rebuilt; reload the page
    Reload,

    /// The rebuild failed; the previous output is still being served
    BuildFailed { message: String },
}

/// Hub for broadcasting HMR messages to all connected clients.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<HmrMessage>,
}

impl HmrHub {
    /// Create a new HMR hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: HmrMessage) {
        // no receivers is fine
        let _ = self.sender.send(msg);
    }

    /// Subscribe to HMR messages.
    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side hot reload script, served at `/__hmr.js`.
///
/// Connects back to whichever host served the page.
pub fn hmr_client_script() -> &'static str {
    HMR_CLIENT
}

const HMR_CLIENT: &str = r#"(function() {
  'use strict';

  const protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  function connect() {
    const ws = new WebSocket(protocol + '//' + location.host + '/__hmr');

    ws.onopen = function() {
      if (reconnectAttempts > 0) {
        location.reload();
        return;
      }
      console.log('[HMR] Connected');
    };

    ws.onmessage = function(event) {
      const msg = JSON.parse(event.data);

      switch (msg.type) {
        case 'reload':
          location.reload();
          break;

        case 'build_failed':
          console.error('[HMR] Build failed:\n' + msg.message);
          break;

        case 'connected':
          break;
      }
    };

    ws.onclose = function() {
      if (reconnectAttempts < maxReconnectAttempts) {
        reconnectAttempts++;
        setTimeout(connect, 1000 * reconnectAttempts);
      }
    };
  }

  connect();
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = HmrHub::new();
        let mut rx = hub.subscribe();

        hub.send(HmrMessage::Reload);

        assert_eq!(rx.try_recv().unwrap(), HmrMessage::Reload);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn serializes_messages() {
        let msg = HmrMessage::BuildFailed {
            message: "Invalid date 'soon' in post.mdx".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains(r#""type":"build_failed""#));
        assert!(json.contains("Invalid date"));
    }

    #[test]
    fn client_uses_page_host() {
        assert!(hmr_client_script().contains("location.host + '/__hmr'"));
    }
}
