use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::ChromeError;

/// How long the child gets to print its WebSocket URL on stderr.
const STARTUP_DEADLINE: Duration = Duration::from_secs(10);

/// Optional knobs for a launch; everything else is fixed.
#[derive(Debug, Default)]
pub struct LaunchOptions {
    /// Proxy server (`host:port`) forwarded as `--proxy-server`.
    pub proxy: Option<String>,
    /// Profile directory. `None` creates a unique per-process temp dir that
    /// is removed when the handle drops, so two instances never contend.
    pub user_data_dir: Option<PathBuf>,
    /// Initial window size forwarded as `--window-size`.
    pub window_size: Option<(u32, u32)>,
}

/// The deterministic flag set every launch gets. Nothing in here may ever
/// prompt the user.
fn base_flags() -> Vec<String> {
    [
        "--headless=new",
        "--remote-debugging-port=0",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-sync",
        "--disable-background-networking",
        "--disable-features=Translate,MediaRouter",
        "--mute-audio",
        "--hide-scrollbars",
        "--disable-notifications",
        "--autoplay-policy=no-user-gesture-required",
        "--use-fake-device-for-media-stream",
        "--use-fake-ui-for-media-stream",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// A launched, owned browser process.
///
/// Dropping the handle kills the child and removes the temp profile.
pub struct ChromeProcess {
    child: Option<tokio::process::Child>,
    ws_url: String,
    port: u16,
    temp_dir: Option<TempDir>,
}

struct TempDir {
    path: PathBuf,
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

impl ChromeProcess {
    /// Browser-level WebSocket URL scraped from stderr.
    #[must_use]
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// The OS-assigned remote debugging port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// PID of the child, or 0 after detach/kill.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.as_ref().and_then(tokio::process::Child::id).unwrap_or(0)
    }

    /// Terminate the child. Idempotent.
    pub fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
        self.child = None;
    }

    /// Hand the child to the caller: it keeps running after this handle
    /// drops, and the profile directory is left in place.
    #[must_use]
    pub fn detach(mut self) -> (u32, u16) {
        let pid = self.pid();
        let port = self.port;
        self.child = None;
        self.temp_dir = None;
        (pid, port)
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Launch the browser and wait for its WebSocket URL.
///
/// The debug port is assigned by the OS (`--remote-debugging-port=0`); the
/// child announces the resulting `ws://` URL on stderr, which is scraped
/// within 10 s.
///
/// # Errors
///
/// Returns `ChromeError::LaunchFailed` if the process cannot be spawned or
/// exits early, and `ChromeError::StartupTimeout` (carrying captured stderr)
/// if no URL appears in time.
pub async fn launch(
    executable: &std::path::Path,
    opts: LaunchOptions,
) -> Result<ChromeProcess, ChromeError> {
    let (data_dir, temp_dir) = match opts.user_data_dir {
        Some(dir) => (dir, None),
        None => {
            let dir = std::env::temp_dir().join(format!("agentpage-{}", random_suffix()));
            std::fs::create_dir_all(&dir)?;
            let td = TempDir { path: dir.clone() };
            (dir, Some(td))
        }
    };

    let mut cmd = tokio::process::Command::new(executable);
    cmd.args(base_flags())
        .arg(format!("--user-data-dir={}", data_dir.display()));

    if let Some(proxy) = &opts.proxy {
        cmd.arg(format!("--proxy-server={proxy}"));
    }
    if let Some((w, h)) = opts.window_size {
        cmd.arg(format!("--window-size={w},{h}"));
    }

    cmd.stdout(Stdio::null()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        ChromeError::LaunchFailed(format!("failed to spawn {}: {e}", executable.display()))
    })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ChromeError::LaunchFailed("child stderr was not captured".into()))?;

    match scrape_ws_url(stderr, STARTUP_DEADLINE).await {
        Ok(ws_url) => {
            let port = port_from_ws_url(&ws_url).ok_or_else(|| {
                ChromeError::LaunchFailed(format!("no port in WebSocket URL {ws_url}"))
            })?;
            debug!(target: "agentpage::chrome", %ws_url, port, "browser ready");
            Ok(ChromeProcess {
                child: Some(child),
                ws_url,
                port,
                temp_dir,
            })
        }
        Err(ScrapeFailure::Exited(captured)) => {
            let _ = child.start_kill();
            Err(ChromeError::LaunchFailed(format!(
                "browser exited before printing a WebSocket URL; stderr: {captured}"
            )))
        }
        Err(ScrapeFailure::Deadline(captured)) => {
            let _ = child.start_kill();
            Err(ChromeError::StartupTimeout(captured))
        }
    }
}

enum ScrapeFailure {
    /// stderr closed without a URL; the child is gone.
    Exited(String),
    /// The startup deadline passed. Carries everything read so far.
    Deadline(String),
}

/// Read stderr line by line until a `ws://` token appears or the deadline
/// passes, capturing everything read for error reporting.
async fn scrape_ws_url(
    stderr: tokio::process::ChildStderr,
    deadline: Duration,
) -> Result<String, ScrapeFailure> {
    let deadline = tokio::time::Instant::now() + deadline;
    let mut reader = BufReader::new(stderr).lines();
    let mut captured = String::new();

    loop {
        let line = match tokio::time::timeout_at(deadline, reader.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None) | Err(_)) => return Err(ScrapeFailure::Exited(captured)),
            Err(_elapsed) => return Err(ScrapeFailure::Deadline(captured)),
        };
        captured.push_str(&line);
        captured.push('\n');
        if let Some(url) = extract_ws_token(&line) {
            return Ok(url);
        }
    }
}

/// First whitespace-delimited `ws://…` token in a line, if any.
fn extract_ws_token(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|tok| tok.starts_with("ws://"))
        .map(ToString::to_string)
}

/// Port component of `ws://host:port/path`.
fn port_from_ws_url(url: &str) -> Option<u16> {
    let rest = url.strip_prefix("ws://")?;
    let host_port = rest.split('/').next()?;
    host_port.rsplit(':').next()?.parse().ok()
}

/// Random hex suffix for the temp profile directory, from `/dev/urandom`
/// with a PID fallback.
fn random_suffix() -> String {
    use std::io::Read;
    let mut buf = [0u8; 8];
    if let Ok(mut f) = std::fs::File::open("/dev/urandom") {
        if f.read_exact(&mut buf).is_ok() {
            return buf.iter().fold(String::with_capacity(16), |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{b:02x}");
                s
            });
        }
    }
    let pid = std::process::id();
    let addr = &raw const buf as usize;
    format!("{pid:x}-{addr:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_ws_token_from_devtools_banner() {
        let line = "DevTools listening on ws://127.0.0.1:33411/devtools/browser/9a2c";
        assert_eq!(
            extract_ws_token(line).as_deref(),
            Some("ws://127.0.0.1:33411/devtools/browser/9a2c")
        );
    }

    #[test]
    fn extract_ws_token_ignores_plain_lines() {
        assert!(extract_ws_token("[1107/0937] Fontconfig error").is_none());
        assert!(extract_ws_token("").is_none());
    }

    #[test]
    fn port_from_ws_url_parses() {
        assert_eq!(
            port_from_ws_url("ws://127.0.0.1:9222/devtools/browser/x"),
            Some(9222)
        );
        assert_eq!(port_from_ws_url("http://127.0.0.1:9222/"), None);
    }

    #[test]
    fn temp_dir_removed_on_drop() {
        let path = std::env::temp_dir().join("agentpage-test-profile-cleanup");
        std::fs::create_dir_all(&path).unwrap();
        assert!(path.exists());
        drop(TempDir { path: path.clone() });
        assert!(!path.exists());
    }

    #[test]
    fn base_flags_are_deterministic_and_promptless() {
        let flags = base_flags();
        assert!(flags.contains(&"--headless=new".to_string()));
        assert!(flags.contains(&"--remote-debugging-port=0".to_string()));
        assert!(flags.contains(&"--no-first-run".to_string()));
        assert!(flags.contains(&"--use-fake-ui-for-media-stream".to_string()));
        assert_eq!(flags, base_flags());
    }
}
