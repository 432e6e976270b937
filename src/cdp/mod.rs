//! Chrome DevTools Protocol client: one WebSocket, flattened sessions.

mod client;
mod error;
mod transport;
mod types;

pub use client::{CdpClient, CdpConfig, SessionView};
pub use error::CdpError;
pub use transport::TransportCommand;
pub use types::{CdpCommand, CdpEvent, CdpProtocolError, CdpResponse, MessageKind, RawCdpMessage};
