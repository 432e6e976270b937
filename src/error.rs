use std::fmt;

use crate::cdp::CdpError;
use crate::chrome::ChromeError;

/// Errors surfaced by the public page API.
///
/// Expected I/O failures (no browser, dropped transport) carry their own
/// variants; once one of those is returned the page handle is dead and every
/// further call on it fails. Best-effort steps (consent dismissal, cookie
/// injection, unrecognized permission types) never surface here.
#[derive(Debug)]
pub enum Error {
    /// No Chromium-family binary could be discovered.
    NoBrowser(String),

    /// The browser process exited or produced no WebSocket URL in time.
    LaunchFailed(String),

    /// The CDP WebSocket closed or errored with work outstanding.
    TransportLost(String),

    /// The browser answered a request with a protocol-level error.
    Protocol {
        /// Remote error code (e.g. -32000).
        code: i64,
        /// Remote error message.
        message: String,
    },

    /// A deadline-bounded await expired.
    Timeout {
        /// What was being awaited.
        what: String,
    },

    /// `Page.navigate` failed before the load event.
    NavigationFailed(String),

    /// An interaction used a reference not present in the current snapshot.
    ReferenceUnknown(String),

    /// `press` received a key name outside the fixed key table.
    UnknownKey {
        /// The rejected key name.
        key: String,
    },

    /// `select` found no option matching the requested value on either the
    /// native or the custom-dropdown path.
    OptionNotFound {
        /// The value that matched nothing.
        value: String,
    },

    /// `go_back`/`go_forward` had no history entry in that direction.
    NoHistory {
        /// "back" or "forward".
        direction: &'static str,
    },

    /// A storage-state document could not be parsed.
    StorageStateInvalid(String),

    /// Programming error or broken internal invariant.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBrowser(msg) => write!(f, "no browser found: {msg}"),
            Self::LaunchFailed(msg) => write!(f, "browser launch failed: {msg}"),
            Self::TransportLost(msg) => write!(f, "transport lost: {msg}"),
            Self::Protocol { code, message } => {
                write!(f, "protocol error ({code}): {message}")
            }
            Self::Timeout { what } => write!(f, "timed out waiting for {what}"),
            Self::NavigationFailed(msg) => write!(f, "navigation failed: {msg}"),
            Self::ReferenceUnknown(r) => {
                write!(f, "unknown reference {r:?}; take a fresh snapshot")
            }
            Self::UnknownKey { key } => {
                write!(
                    f,
                    "unknown key {key:?}; valid keys: {}",
                    crate::input::key_names().join(", ")
                )
            }
            Self::OptionNotFound { value } => {
                write!(f, "no option matching {value:?}")
            }
            Self::NoHistory { direction } => {
                write!(f, "no history entry to go {direction} to")
            }
            Self::StorageStateInvalid(msg) => {
                write!(f, "invalid storage state: {msg}")
            }
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<CdpError> for Error {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::Connection(msg) => Self::TransportLost(msg),
            CdpError::ConnectionLost => Self::TransportLost("connection closed".into()),
            CdpError::ConnectionTimeout => Self::Timeout {
                what: "WebSocket connection".into(),
            },
            CdpError::CommandTimeout { method } | CdpError::EventTimeout { method } => {
                Self::Timeout { what: method }
            }
            CdpError::Protocol { code, message } => Self::Protocol { code, message },
            CdpError::InvalidResponse(msg) | CdpError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<ChromeError> for Error {
    fn from(e: ChromeError) -> Self {
        match e {
            ChromeError::NotFound(msg) => Self::NoBrowser(msg),
            ChromeError::LaunchFailed(msg) | ChromeError::StartupTimeout(msg) => {
                Self::LaunchFailed(msg)
            }
            ChromeError::HttpError(msg) | ChromeError::ParseError(msg) => Self::LaunchFailed(msg),
            ChromeError::Io(io) => Self::LaunchFailed(io.to_string()),
        }
    }
}
