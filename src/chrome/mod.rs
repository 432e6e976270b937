//! Browser process management: find a Chromium-family binary, launch it
//! headless with a deterministic flag set, or attach to a running instance.

mod discovery;
mod error;
mod finder;
mod launcher;

pub use discovery::{BrowserVersion, connect_existing};
pub use error::ChromeError;
pub use finder::find_browser;
pub use launcher::{ChromeProcess, LaunchOptions, launch};
