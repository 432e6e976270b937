use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request envelope.
///
/// The `sessionId` sits at the top level: sessions attached with
/// `flatten: true` multiplex over the one socket by this field alone.
#[derive(Debug, Serialize)]
pub struct CdpCommand {
    /// Correlation id, unique per connection.
    pub id: u64,
    /// Method name, e.g. `Page.navigate`.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Every inbound frame deserializes into this union of response and event
/// fields, then [`classify`](Self::classify) splits it.
#[derive(Debug, Deserialize)]
pub struct RawCdpMessage {
    /// Present on responses, absent on events.
    pub id: Option<u64>,
    /// Present on events.
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<CdpProtocolError>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Error payload the browser attaches to a failed request.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpProtocolError {
    pub code: i64,
    pub message: String,
}

/// A response correlated to a sent command.
#[derive(Debug)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Result<Value, CdpProtocolError>,
    pub session_id: Option<String>,
}

/// An asynchronous event pushed by the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    /// Session the event belongs to; `None` for browser-level events.
    pub session_id: Option<String>,
}

/// Outcome of classifying a raw inbound frame.
pub enum MessageKind {
    Response(CdpResponse),
    Event(CdpEvent),
}

impl RawCdpMessage {
    /// A frame with an `id` is a response; a frame with only a `method` is an
    /// event. Anything else is unclassifiable and dropped by the transport.
    #[must_use]
    pub fn classify(self) -> Option<MessageKind> {
        if let Some(id) = self.id {
            let result = match self.error {
                Some(err) => Err(err),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            Some(MessageKind::Response(CdpResponse {
                id,
                result,
                session_id: self.session_id,
            }))
        } else {
            let method = self.method?;
            Some(MessageKind::Event(CdpEvent {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            }))
        }
    }
}
