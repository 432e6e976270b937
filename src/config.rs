use std::path::PathBuf;
use std::time::Duration;

use crate::snapshot::SnapshotMode;

/// Default remote-debugging port of the external browser used by
/// [`BrowserMode::Headed`] and the hybrid fallback.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// How the session obtains its browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserMode {
    /// Launch an owned headless browser with a fresh profile.
    Headless,
    /// Attach to an already-running browser on [`SessionConfig::debug_port`].
    /// The browser is never owned; close leaves it running.
    Headed,
    /// Start headless; on a detected bot-challenge page, tear down and retry
    /// once against the external browser on the debug port.
    Hybrid,
}

/// Viewport emulation, applied with a device scale factor of 1, non-mobile.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Configuration for one page session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Browser acquisition mode.
    pub mode: BrowserMode,
    /// Run the consent dismisser after every navigation.
    pub dismiss_consent: bool,
    /// Default pruning mode for snapshots.
    pub snapshot_mode: SnapshotMode,
    /// Free-text context keywords steering act-mode card condensing.
    pub context: Option<String>,
    /// Proxy server passed to the launched browser (`host:port`).
    pub proxy: Option<String>,
    /// Viewport emulation; `None` leaves the browser default.
    pub viewport: Option<Viewport>,
    /// Storage-state document to seed cookies from at session creation.
    /// A missing file is skipped silently; a malformed one is an error.
    pub storage_state: Option<PathBuf>,
    /// Debug port of the external browser (headed mode, hybrid fallback).
    pub debug_port: u16,
    /// Deadline for navigation waits.
    pub navigation_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: BrowserMode::Headless,
            dismiss_consent: true,
            snapshot_mode: SnapshotMode::Act,
            context: None,
            proxy: None,
            viewport: None,
            storage_state: None,
            debug_port: DEFAULT_DEBUG_PORT,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.mode, BrowserMode::Headless);
        assert!(cfg.dismiss_consent);
        assert_eq!(cfg.debug_port, 9222);
        assert_eq!(cfg.navigation_timeout, Duration::from_secs(30));
        assert!(cfg.viewport.is_none());
    }
}
