//! Live update channel.
//!
//! Connected browsers hold a WebSocket at `/__strand/live`; the server
//! broadcasts a message after every rebuild and the injected client
//! script reloads the page (or surfaces the build error) in response.

use crate::state::DevState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// URL path of the injected client script.
pub const CLIENT_PATH: &str = "/__strand/client.js";

/// URL path of the live-update WebSocket.
pub const SOCKET_PATH: &str = "/__strand/live";

/// Messages broadcast to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// Handshake sent once on connect.
    Connected,
    /// A new bundle is available; lists the source files behind it.
    Update {
        #[serde(rename = "changedModules")]
        changed_modules: Vec<String>,
        timestamp: u64,
    },
    /// A rebuild failed; the previous bundle is still being served.
    Error { message: String },
}

impl LiveMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }
}

/// Browser-side client, served at [`CLIENT_PATH`] and injected into the
/// host document. Reconnects with a short backoff so a server restart
/// picks clients back up.
pub const CLIENT_JS: &str = r#"// strand live-update client
(function () {
  function connect() {
    var proto = location.protocol === "https:" ? "wss:" : "ws:";
    var socket = new WebSocket(proto + "//" + location.host + "/__strand/live");
    socket.onmessage = function (event) {
      var msg = JSON.parse(event.data);
      if (msg.type === "update") {
        location.reload();
      } else if (msg.type === "error") {
        console.error("[strand] build failed:\n" + msg.message);
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

/// Upgrade handler for [`SOCKET_PATH`].
pub async fn live_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DevState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<DevState>) {
    let mut rx = state.live_tx.subscribe();

    if socket
        .send(Message::Text(LiveMessage::Connected.to_json()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Ok(msg) = msg else { break };
                if socket.send(Message::Text(msg.to_json())).await.is_err() {
                    debug!("live client disconnected");
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    // Clients only listen; ignore anything they send.
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_type_tag() {
        assert_eq!(LiveMessage::Connected.to_json(), r#"{"type":"connected"}"#);
        assert_eq!(
            LiveMessage::Update {
                changed_modules: vec!["/src/main.js".to_string()],
                timestamp: 5,
            }
            .to_json(),
            r#"{"type":"update","changedModules":["/src/main.js"],"timestamp":5}"#
        );
        assert_eq!(
            LiveMessage::Error {
                message: "boom".to_string()
            }
            .to_json(),
            r#"{"type":"error","message":"boom"}"#
        );
    }

    #[test]
    fn client_script_targets_the_socket_path() {
        assert!(CLIENT_JS.contains(SOCKET_PATH));
    }
}
