use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::error::CdpError;
use super::types::{CdpCommand, CdpEvent, MessageKind, RawCdpMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscriber map key: `(method, session)`. Global subscribers use `None`.
type SubscriberKey = (String, Option<String>);

/// Command sent from a client handle to the transport task.
pub enum TransportCommand {
    /// Write a request and deliver its correlated response.
    Send {
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
        deadline: Instant,
    },
    /// Register an event subscriber. Dropping the receiver unsubscribes;
    /// closed senders are pruned on the next dispatch of the same method.
    Subscribe {
        method: String,
        session_id: Option<String>,
        event_tx: mpsc::Sender<CdpEvent>,
    },
    /// Close the socket and stop the task.
    Shutdown,
}

struct PendingRequest {
    response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
    method: String,
    deadline: Instant,
}

/// Clonable handle to the transport task.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    command_tx: mpsc::Sender<TransportCommand>,
    connected: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl TransportHandle {
    /// Deliver a command to the background task.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the task has exited.
    pub async fn send(&self, cmd: TransportCommand) -> Result<(), CdpError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| CdpError::Internal("transport task is not running".into()))
    }

    /// Whether the socket is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Next unique correlation id for this connection.
    pub fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Connect the WebSocket and spawn the transport task.
///
/// # Errors
///
/// Returns `CdpError::Connection` if the handshake fails, or
/// `CdpError::ConnectionTimeout` if it exceeds `connect_timeout`.
pub async fn spawn_transport(
    url: &str,
    channel_capacity: usize,
    connect_timeout: Duration,
) -> Result<TransportHandle, CdpError> {
    let ws_stream = match tokio::time::timeout(
        connect_timeout,
        tokio_tungstenite::connect_async(url),
    )
    .await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => return Err(CdpError::Connection(e.to_string())),
        Err(_) => return Err(CdpError::ConnectionTimeout),
    };
    debug!(target: "agentpage::cdp", %url, "transport connected");

    let connected = Arc::new(AtomicBool::new(true));
    let next_id = Arc::new(AtomicU64::new(1));
    let (command_tx, command_rx) = mpsc::channel(channel_capacity);

    let handle = TransportHandle {
        command_tx,
        connected: Arc::clone(&connected),
        next_id,
    };

    tokio::spawn(async move {
        let mut task = TransportTask {
            ws_stream,
            command_rx,
            pending: HashMap::new(),
            subscribers: HashMap::new(),
            connected,
            lost: false,
        };
        task.run().await;
    });

    Ok(handle)
}

/// Background task owning the socket. There is no reconnection: a dropped
/// socket fails every pending request with `ConnectionLost` and the task
/// drains all further commands with the same error until shut down.
struct TransportTask {
    ws_stream: WsStream,
    command_rx: mpsc::Receiver<TransportCommand>,
    pending: HashMap<u64, PendingRequest>,
    subscribers: HashMap<SubscriberKey, Vec<mpsc::Sender<CdpEvent>>>,
    connected: Arc<AtomicBool>,
    lost: bool,
}

impl TransportTask {
    async fn run(&mut self) {
        loop {
            if self.lost {
                match self.command_rx.recv().await {
                    Some(TransportCommand::Send { response_tx, .. }) => {
                        let _ = response_tx.send(Err(CdpError::ConnectionLost));
                    }
                    // Dropping the sender closes the receiver immediately.
                    Some(TransportCommand::Subscribe { .. }) => {}
                    Some(TransportCommand::Shutdown) | None => return,
                }
                continue;
            }

            let next_deadline = self.pending.values().map(|p| p.deadline).min();
            let timeout_sleep = async {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                ws_msg = self.ws_stream.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => self.handle_text_message(&text),
                        Some(Ok(Message::Close(_)) | Err(_)) | None => self.mark_lost(),
                        Some(Ok(_)) => {
                            // Binary, Ping, Pong, Frame
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(TransportCommand::Send { command, response_tx, deadline }) => {
                            self.handle_send(command, response_tx, deadline).await;
                        }
                        Some(TransportCommand::Subscribe { method, session_id, event_tx }) => {
                            self.subscribers
                                .entry((method, session_id))
                                .or_default()
                                .push(event_tx);
                        }
                        Some(TransportCommand::Shutdown) | None => {
                            self.fail_pending();
                            let _ = self.ws_stream.close(None).await;
                            self.connected.store(false, Ordering::Relaxed);
                            return;
                        }
                    }
                }

                () = timeout_sleep => self.sweep_timeouts(),
            }
        }
    }

    fn handle_text_message(&mut self, text: &str) {
        let Ok(raw) = serde_json::from_str::<RawCdpMessage>(text) else {
            return;
        };
        let Some(kind) = raw.classify() else {
            return;
        };

        match kind {
            MessageKind::Response(response) => {
                if let Some(pending) = self.pending.remove(&response.id) {
                    trace!(target: "agentpage::cdp", method = %pending.method, "response");
                    let result = match response.result {
                        Ok(value) => Ok(value),
                        Err(err) => Err(CdpError::Protocol {
                            code: err.code,
                            message: err.message,
                        }),
                    };
                    let _ = pending.response_tx.send(result);
                }
            }
            MessageKind::Event(event) => {
                trace!(target: "agentpage::cdp", method = %event.method, "event");
                self.dispatch_event(&event);
            }
        }
    }

    /// Session-scoped subscribers are served first, then global subscribers
    /// for the same method; global subscribers read the session id off the
    /// event itself.
    fn dispatch_event(&mut self, event: &CdpEvent) {
        if event.session_id.is_some() {
            self.dispatch_to(&(event.method.clone(), event.session_id.clone()), event);
        }
        self.dispatch_to(&(event.method.clone(), None), event);
    }

    fn dispatch_to(&mut self, key: &SubscriberKey, event: &CdpEvent) {
        if let Some(senders) = self.subscribers.get_mut(key) {
            senders.retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
            if senders.is_empty() {
                self.subscribers.remove(key);
            }
        }
    }

    async fn handle_send(
        &mut self,
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
        deadline: Instant,
    ) {
        let id = command.id;
        let method = command.method.clone();

        let json = match serde_json::to_string(&command) {
            Ok(j) => j,
            Err(e) => {
                let _ =
                    response_tx.send(Err(CdpError::Internal(format!("serialization error: {e}"))));
                return;
            }
        };

        trace!(target: "agentpage::cdp", %method, id, "send");
        if self.ws_stream.send(Message::Text(json.into())).await.is_err() {
            let _ = response_tx.send(Err(CdpError::ConnectionLost));
            self.mark_lost();
            return;
        }

        self.pending.insert(
            id,
            PendingRequest {
                response_tx,
                method,
                deadline,
            },
        );
    }

    fn sweep_timeouts(&mut self) {
        let now = Instant::now();
        let timed_out: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        for id in timed_out {
            if let Some(pending) = self.pending.remove(&id) {
                let _ = pending.response_tx.send(Err(CdpError::CommandTimeout {
                    method: pending.method,
                }));
            }
        }
    }

    fn fail_pending(&mut self) {
        for (_, req) in std::mem::take(&mut self.pending) {
            let _ = req.response_tx.send(Err(CdpError::ConnectionLost));
        }
    }

    fn mark_lost(&mut self) {
        debug!(target: "agentpage::cdp", "socket dropped; transport is done");
        self.connected.store(false, Ordering::Relaxed);
        self.lost = true;
        self.fail_pending();
        // Drop every subscriber sender so receivers observe end-of-stream.
        self.subscribers.clear();
    }
}
