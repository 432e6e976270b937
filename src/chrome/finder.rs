use std::path::{Path, PathBuf};

use super::ChromeError;

/// Executable names tried, in order, against every `PATH` directory.
const CANDIDATE_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// macOS application bundle binaries tried after the `PATH` names.
const MACOS_BUNDLES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

/// Find an installed Chromium-family browser.
///
/// The `AGENTPAGE_BROWSER` environment variable wins when it names an
/// existing file; otherwise the candidate list is walked in order.
///
/// # Errors
///
/// Returns `ChromeError::NotFound` when nothing exists.
pub fn find_browser() -> Result<PathBuf, ChromeError> {
    let env_override = std::env::var("AGENTPAGE_BROWSER").ok().map(PathBuf::from);
    find_browser_from(env_override.as_deref(), &std::env::var("PATH").unwrap_or_default())
}

/// Testable core of [`find_browser`]: override and `PATH` are parameters.
fn find_browser_from(env_override: Option<&Path>, path: &str) -> Result<PathBuf, ChromeError> {
    if let Some(p) = env_override {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }

    for candidate in candidates(path) {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ChromeError::NotFound(
        "no Chromium-family binary on PATH; set AGENTPAGE_BROWSER to the executable".into(),
    ))
}

fn candidates(path: &str) -> Vec<PathBuf> {
    let path_dirs: Vec<PathBuf> = path.split(':').map(PathBuf::from).collect();

    let mut out = Vec::new();
    for name in CANDIDATE_NAMES {
        for dir in &path_dirs {
            out.push(dir.join(name));
        }
    }
    for bundle in MACOS_BUNDLES {
        out.push(PathBuf::from(bundle));
    }
    out
}
