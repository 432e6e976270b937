//! Shared mock-CDP plumbing for integration tests: a scripted WebSocket
//! server that answers the command stream the way a browser would, records
//! every command it sees, and emits load events on navigation.

// Each test binary compiles this module; not every binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Spawn a scripted CDP server.
///
/// Every received command is recorded. Responses:
/// - `Target.createTarget` → a fixed target id
/// - `Target.attachToTarget` → session id `S1`
/// - `Accessibility.getFullAXTree` → the given node batch
/// - `DOM.getBoxModel` → a 200×60 content quad at (100, 200)
/// - `Page.navigate` → a frame id, followed by a session-scoped
///   `Page.loadEventFired` event
/// - anything else → `{}`
pub async fn spawn_cdp_server(
    ax_nodes: Vec<Value>,
) -> (SocketAddr, mpsc::UnboundedReceiver<Value>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (record_tx, record_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let record_tx = record_tx.clone();
            let ax_nodes = ax_nodes.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    let Message::Text(text) = msg else { continue };
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let _ = record_tx.send(cmd.clone());

                    let method = cmd["method"].as_str().unwrap_or_default();
                    let result = match method {
                        "Target.createTarget" => json!({"targetId": "TARGET-1"}),
                        "Target.attachToTarget" => json!({"sessionId": "S1"}),
                        "Accessibility.getFullAXTree" => json!({"nodes": ax_nodes}),
                        "DOM.getBoxModel" => json!({
                            "model": {
                                "content": [100, 200, 300, 200, 300, 260, 100, 260]
                            }
                        }),
                        "Page.navigate" => json!({"frameId": "FRAME-1"}),
                        _ => json!({}),
                    };

                    let mut response = json!({"id": cmd["id"], "result": result});
                    if let Some(sid) = cmd.get("sessionId") {
                        response["sessionId"] = sid.clone();
                    }
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();

                    if method == "Page.navigate" {
                        let mut event = json!({
                            "method": "Page.loadEventFired",
                            "params": {"timestamp": 1.0},
                        });
                        if let Some(sid) = cmd.get("sessionId") {
                            event["sessionId"] = sid.clone();
                        }
                        sink.send(Message::Text(event.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            });
        }
    });

    (addr, record_rx, handle)
}

/// Drain every recorded command currently in the channel.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        out.push(cmd);
    }
    out
}

/// The methods of a recorded command batch, in arrival order.
pub fn methods(commands: &[Value]) -> Vec<String> {
    commands
        .iter()
        .map(|c| c["method"].as_str().unwrap_or_default().to_owned())
        .collect()
}
