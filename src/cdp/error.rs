use std::fmt;

/// Errors from the CDP transport layer.
#[derive(Debug)]
pub enum CdpError {
    /// The WebSocket could not be established or a write failed.
    Connection(String),

    /// The initial connection attempt exceeded its timeout.
    ConnectionTimeout,

    /// A command got no response before its deadline.
    CommandTimeout {
        /// The method that timed out.
        method: String,
    },

    /// An awaited event did not arrive before its deadline.
    EventTimeout {
        /// The event method that was awaited.
        method: String,
    },

    /// The browser returned an error object for a request.
    Protocol {
        /// Remote error code (e.g. -32000).
        code: i64,
        /// Remote error message.
        message: String,
    },

    /// The socket closed or errored; the transport will accept no more work.
    ConnectionLost,

    /// A message from the browser could not be interpreted.
    InvalidResponse(String),

    /// The transport task died or a channel closed underneath us.
    Internal(String),
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "CDP connection error: {msg}"),
            Self::ConnectionTimeout => write!(f, "CDP connection timed out"),
            Self::CommandTimeout { method } => write!(f, "CDP command timed out: {method}"),
            Self::EventTimeout { method } => write!(f, "CDP event timed out: {method}"),
            Self::Protocol { code, message } => {
                write!(f, "CDP protocol error ({code}): {message}")
            }
            Self::ConnectionLost => write!(f, "CDP connection lost"),
            Self::InvalidResponse(msg) => write!(f, "CDP invalid response: {msg}"),
            Self::Internal(msg) => write!(f, "CDP internal error: {msg}"),
        }
    }
}

impl std::error::Error for CdpError {}
