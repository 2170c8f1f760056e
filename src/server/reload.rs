//! Live reload over WebSocket

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::ServerState;

/// WebSocket endpoint the injected client connects to
pub const RELOAD_PATH: &str = "/__assetpipe/livereload";

/// Live-reload message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    Reload {
        reason: String,
    },

    /// A stylesheet changed and can be swapped in place
    Css {
        path: String,
    },
}

/// Handle WebSocket upgrade for live reload
pub async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

/// Handle a live-reload WebSocket connection
async fn handle_reload_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut reload_rx = state.reload_tx.subscribe();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Live-reload client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let message = match reload_rx.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Live-reload client lagged, skipped {} message(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // The client never sends anything meaningful; wait for it to go away.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Live-reload connection closed");
}

/// Inject the live-reload client before `</body>`, or append it
pub fn inject_reload_client(html: &str) -> String {
    let script = format!(
        r#"
<script>
// assetpipe live reload
(function() {{
  var ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{path}');

  ws.onmessage = function(event) {{
    var message = JSON.parse(event.data);

    switch (message.type) {{
      case 'reload':
        console.log('[assetpipe] Reload:', message.reason);
        location.reload();
        break;

      case 'css':
        console.log('[assetpipe] Stylesheet updated:', message.path);
        document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
          var url = new URL(link.href);
          url.searchParams.set('t', Date.now());
          link.href = url.toString();
        }});
        break;

      case 'connected':
        console.log('[assetpipe] Live reload connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[assetpipe] Disconnected, retrying...');
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
</script>
"#,
        path = RELOAD_PATH
    );

    if let Some(pos) = html.rfind("</body>") {
        let mut result = html.to_string();
        result.insert_str(pos, &script);
        result
    } else {
        format!("{}{}", html, script)
    }
}
