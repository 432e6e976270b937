//! Browser automation for autonomous agents over the Chrome DevTools Protocol.
//!
//! A [`Page`] owns a single browser page behind one CDP WebSocket. It exposes
//! a pruned accessibility snapshot of the page in which interactive elements
//! carry opaque `[ref=N]` markers, and interaction primitives (click, type,
//! press, scroll, hover, select, drag, upload) that take those references as
//! targets. References are valid only against the snapshot that produced
//! them; every fresh snapshot replaces the reference map wholesale.

pub mod cdp;
pub mod chrome;
pub mod config;
pub mod consent;
pub mod cookies;
pub mod error;
pub mod factory;
pub mod input;
pub mod page;
pub mod snapshot;
pub mod state;
pub mod stealth;

pub use config::{BrowserMode, SessionConfig, Viewport};
pub use cookies::{Cookie, CookieSource, SameSite};
pub use error::Error;
pub use input::TypeOptions;
pub use page::{ConsoleRecord, DialogRecord, ImageFormat, Page, TabInfo, WaitCondition};
pub use snapshot::SnapshotMode;
pub use state::StorageState;
