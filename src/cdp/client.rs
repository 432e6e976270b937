use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use super::error::CdpError;
use super::transport::{TransportCommand, TransportHandle, spawn_transport};
use super::types::CdpEvent;

/// Tunables for one CDP connection.
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Deadline for the initial WebSocket handshake.
    pub connect_timeout: Duration,
    /// Deadline applied to every individual command.
    pub command_timeout: Duration,
    /// Capacity of the internal command and event channels.
    pub channel_capacity: usize,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            channel_capacity: 256,
        }
    }
}

/// A CDP client over one WebSocket.
///
/// Browser-level commands (target creation, permission grants) go through the
/// client directly; page work goes through a [`SessionView`] obtained from
/// [`attach`](Self::attach).
#[derive(Debug)]
pub struct CdpClient {
    handle: TransportHandle,
    config: CdpConfig,
    url: String,
}

impl CdpClient {
    /// Connect to a CDP WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Connection` on handshake failure or
    /// `CdpError::ConnectionTimeout` when the attempt exceeds the deadline.
    pub async fn connect(url: &str, config: CdpConfig) -> Result<Self, CdpError> {
        let handle = spawn_transport(url, config.channel_capacity, config.connect_timeout).await?;
        Ok(Self {
            handle,
            config,
            url: url.to_owned(),
        })
    }

    /// Send a browser-level command (no session).
    ///
    /// # Errors
    ///
    /// Returns `CdpError::CommandTimeout`, `CdpError::Protocol`, or
    /// `CdpError::ConnectionLost` depending on how the request fails.
    pub async fn send(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, CdpError> {
        send_impl(&self.handle, self.config.command_timeout, method, params, None).await
    }

    /// Subscribe to browser-level events by method name.
    ///
    /// Dropping the returned receiver is the unsubscribe. Global subscribers
    /// also observe session-scoped events of the same method; the session id
    /// rides on each [`CdpEvent`].
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn subscribe(&self, method: &str) -> Result<mpsc::Receiver<CdpEvent>, CdpError> {
        subscribe_impl(&self.handle, self.config.channel_capacity, method, None).await
    }

    /// Await a single browser-level event, with a deadline.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::EventTimeout` when the deadline expires. The
    /// subscription is released on every path.
    pub async fn once(
        &self,
        method: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, CdpError> {
        let rx = self.subscribe(method).await?;
        once_impl(rx, method, timeout).await
    }

    /// Attach to a target with a flattened session and return a view scoped
    /// to the resulting session id.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Protocol` if the target cannot be attached, or
    /// `CdpError::InvalidResponse` if no session id comes back.
    pub async fn attach(&self, target_id: &str) -> Result<SessionView, CdpError> {
        let params = serde_json::json!({
            "targetId": target_id,
            "flatten": true,
        });
        let result = self.send("Target.attachToTarget", Some(params)).await?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| {
                CdpError::InvalidResponse("Target.attachToTarget returned no sessionId".into())
            })?
            .to_owned();

        Ok(SessionView {
            session_id,
            handle: self.handle.clone(),
            config: self.config.clone(),
        })
    }

    /// Close the socket and stop the transport task.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the task already exited.
    pub async fn close(&self) -> Result<(), CdpError> {
        self.handle.send(TransportCommand::Shutdown).await
    }

    /// Whether the socket is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// The WebSocket URL this client connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Projection of the client onto one flattened session: the same three
/// operations, with the session id stamped on everything.
#[derive(Debug, Clone)]
pub struct SessionView {
    session_id: String,
    handle: TransportHandle,
    config: CdpConfig,
}

impl SessionView {
    /// Send a command within this session.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CdpClient::send`].
    pub async fn send(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, CdpError> {
        send_impl(
            &self.handle,
            self.config.command_timeout,
            method,
            params,
            Some(self.session_id.clone()),
        )
        .await
    }

    /// Subscribe to events delivered to this session.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn subscribe(&self, method: &str) -> Result<mpsc::Receiver<CdpEvent>, CdpError> {
        subscribe_impl(
            &self.handle,
            self.config.channel_capacity,
            method,
            Some(self.session_id.clone()),
        )
        .await
    }

    /// Await a single event on this session, with a deadline.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::EventTimeout` when the deadline expires.
    pub async fn once(
        &self,
        method: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, CdpError> {
        let rx = self.subscribe(method).await?;
        once_impl(rx, method, timeout).await
    }

    /// The flattened session id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

async fn send_impl(
    handle: &TransportHandle,
    command_timeout: Duration,
    method: &str,
    params: Option<serde_json::Value>,
    session_id: Option<String>,
) -> Result<serde_json::Value, CdpError> {
    let id = handle.next_message_id();
    let command = super::types::CdpCommand {
        id,
        method: method.to_owned(),
        params,
        session_id,
    };

    let (response_tx, response_rx) = oneshot::channel();
    let deadline = Instant::now() + command_timeout;

    handle
        .send(TransportCommand::Send {
            command,
            response_tx,
            deadline,
        })
        .await?;

    response_rx
        .await
        .map_err(|_| CdpError::Internal("transport task exited before responding".into()))?
}

async fn subscribe_impl(
    handle: &TransportHandle,
    channel_capacity: usize,
    method: &str,
    session_id: Option<String>,
) -> Result<mpsc::Receiver<CdpEvent>, CdpError> {
    let (event_tx, event_rx) = mpsc::channel(channel_capacity);
    handle
        .send(TransportCommand::Subscribe {
            method: method.to_owned(),
            session_id,
            event_tx,
        })
        .await?;
    Ok(event_rx)
}

/// Shared one-shot wait: first event wins, deadline loses. The receiver is
/// dropped on both paths, which releases the subscription.
async fn once_impl(
    mut rx: mpsc::Receiver<CdpEvent>,
    method: &str,
    timeout: Duration,
) -> Result<serde_json::Value, CdpError> {
    tokio::select! {
        event = rx.recv() => match event {
            Some(event) => Ok(event.params),
            None => Err(CdpError::ConnectionLost),
        },
        () = tokio::time::sleep(timeout) => Err(CdpError::EventTimeout {
            method: method.to_owned(),
        }),
    }
}
