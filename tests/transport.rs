//! Transport behavior against mock WebSocket servers: correlation, protocol
//! errors, timeouts, loss, and event routing.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use agentpage::cdp::{CdpClient, CdpConfig, CdpError};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

fn fast_config() -> CdpConfig {
    CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_millis(500),
        channel_capacity: 64,
    }
}

/// A server that accepts commands but never responds.
async fn start_silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (_sink, mut source) = ws.split();
                while source.next().await.is_some() {}
            });
        }
    });
    (addr, handle)
}

/// A server that answers every command with a protocol error.
async fn start_error_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let response = json!({
                        "id": cmd["id"],
                        "error": {"code": -32000, "message": "No node with given id"}
                    });
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                }
            });
        }
    });
    (addr, handle)
}

/// A server that drops the socket on the first command.
async fn start_dropping_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let _ = ws.next().await;
                let _ = ws.close(None).await;
            });
        }
    });
    (addr, handle)
}

#[tokio::test]
async fn commands_correlate_by_id() {
    let (addr, mut records, _server) = common::spawn_cdp_server(Vec::new()).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();

    let result = client.send("Browser.getVersion", None).await.unwrap();
    assert_eq!(result, json!({}));

    let version_cmd = &common::drain(&mut records)[0];
    assert_eq!(version_cmd["method"], "Browser.getVersion");
    assert!(version_cmd["id"].is_u64());
    client.close().await.unwrap();
}

#[tokio::test]
async fn protocol_errors_carry_code_and_message() {
    let (addr, _server) = start_error_server().await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();

    let err = client.send("DOM.getBoxModel", None).await.unwrap_err();
    match err {
        CdpError::Protocol { code, message } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "No node with given id");
        }
        other => panic!("expected protocol error, got {other}"),
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn unanswered_commands_time_out() {
    let (addr, _server) = start_silent_server().await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();

    let err = client.send("Page.navigate", None).await.unwrap_err();
    match err {
        CdpError::CommandTimeout { method } => assert_eq!(method, "Page.navigate"),
        other => panic!("expected command timeout, got {other}"),
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn dropped_socket_fails_pending_and_everything_after() {
    let (addr, _server) = start_dropping_server().await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();

    let err = client.send("Page.enable", None).await.unwrap_err();
    assert!(
        matches!(err, CdpError::ConnectionLost | CdpError::CommandTimeout { .. }),
        "first command after drop: {err}"
    );

    // The transport never reconnects; every later command fails immediately.
    let err = client.send("Page.enable", None).await.unwrap_err();
    assert!(matches!(err, CdpError::ConnectionLost), "got {err}");
    assert!(!client.is_connected());
}

#[tokio::test]
async fn attach_creates_a_flattened_session_view() {
    let (addr, mut records, _server) = common::spawn_cdp_server(Vec::new()).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();

    let session = client.attach("TARGET-1").await.unwrap();
    assert_eq!(session.session_id(), "S1");

    session.send("Page.enable", None).await.unwrap();

    let commands = common::drain(&mut records);
    let attach = commands
        .iter()
        .find(|c| c["method"] == "Target.attachToTarget")
        .unwrap();
    assert_eq!(attach["params"]["flatten"], true);
    assert!(attach.get("sessionId").is_none(), "attach is browser-level");

    let enable = commands.iter().find(|c| c["method"] == "Page.enable").unwrap();
    assert_eq!(enable["sessionId"], "S1", "session command carries top-level id");
    client.close().await.unwrap();
}

#[tokio::test]
async fn events_route_to_session_then_global_subscribers() {
    let (addr, _records, _server) = common::spawn_cdp_server(Vec::new()).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();
    let session = client.attach("TARGET-1").await.unwrap();

    let mut session_rx = session.subscribe("Page.loadEventFired").await.unwrap();
    let mut global_rx = client.subscribe("Page.loadEventFired").await.unwrap();

    // The scripted server emits loadEventFired after answering a navigate.
    session
        .send("Page.navigate", Some(json!({"url": "about:blank"})))
        .await
        .unwrap();

    let scoped = tokio::time::timeout(Duration::from_secs(2), session_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scoped.method, "Page.loadEventFired");
    assert_eq!(scoped.session_id.as_deref(), Some("S1"));

    let global = tokio::time::timeout(Duration::from_secs(2), global_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        global.session_id.as_deref(),
        Some("S1"),
        "global subscribers observe the event's session id"
    );
    client.close().await.unwrap();
}

#[tokio::test]
async fn once_returns_params_or_times_out() {
    let (addr, _records, _server) = common::spawn_cdp_server(Vec::new()).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), fast_config())
        .await
        .unwrap();
    let session = client.attach("TARGET-1").await.unwrap();

    // No navigation, no event: the deadline fires and the subscription is
    // released with it.
    let err = session
        .once("Page.loadEventFired", Duration::from_millis(200))
        .await
        .unwrap_err();
    match err {
        CdpError::EventTimeout { method } => assert_eq!(method, "Page.loadEventFired"),
        other => panic!("expected event timeout, got {other}"),
    }

    // With a navigation in flight the event arrives.
    let session2 = session.clone();
    let waiter = tokio::spawn(async move {
        session2.once("Page.loadEventFired", Duration::from_secs(2)).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    session
        .send("Page.navigate", Some(json!({"url": "about:blank"})))
        .await
        .unwrap();
    let params = waiter.await.unwrap().unwrap();
    assert_eq!(params["timestamp"], 1.0);
    client.close().await.unwrap();
}
