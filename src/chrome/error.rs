use std::fmt;

/// Errors from browser discovery and launch.
#[derive(Debug)]
pub enum ChromeError {
    /// No Chromium-family executable could be located.
    NotFound(String),

    /// The process could not be spawned or exited before becoming ready.
    LaunchFailed(String),

    /// No WebSocket URL appeared on stderr within the startup deadline.
    /// Carries everything the child wrote to stderr up to that point.
    StartupTimeout(String),

    /// The HTTP discovery endpoint could not be reached.
    HttpError(String),

    /// A discovery response could not be parsed.
    ParseError(String),

    /// An I/O error while managing the child process.
    Io(std::io::Error),
}

impl fmt::Display for ChromeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "browser not found: {msg}"),
            Self::LaunchFailed(msg) => write!(f, "browser launch failed: {msg}"),
            Self::StartupTimeout(stderr) => {
                write!(f, "browser printed no WebSocket URL in time; stderr: {stderr}")
            }
            Self::HttpError(msg) => write!(f, "browser HTTP error: {msg}"),
            Self::ParseError(msg) => write!(f, "browser response parse error: {msg}"),
            Self::Io(e) => write!(f, "browser I/O error: {e}"),
        }
    }
}

impl std::error::Error for ChromeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChromeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
