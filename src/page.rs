//! The public page handle: one browser page behind one CDP WebSocket, with
//! navigation, snapshots, reference-based interaction, waits, export, and
//! the hybrid bot-challenge fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde_json::json;
use tracing::{debug, warn};

use crate::cdp::{CdpClient, CdpConfig, SessionView};
use crate::chrome::{self, ChromeProcess, LaunchOptions};
use crate::config::{BrowserMode, SessionConfig};
use crate::consent;
use crate::cookies::{self, Cookie, CookieSource};
use crate::error::Error;
use crate::factory;
use crate::input::{Dispatcher, TypeOptions};
use crate::snapshot::{self, PruneOptions, SnapshotMode};
use crate::state::{self, StorageState};

/// Settle delay after the load event, letting late layout land.
const SETTLE_AFTER_LOAD: Duration = Duration::from_millis(500);

/// Poll interval for [`Page::wait_for`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default continuous-quiet threshold for network idle.
const NETWORK_IDLE_THRESHOLD: Duration = Duration::from_millis(500);

/// Phrases that mark a bot-challenge interstitial.
const CHALLENGE_PHRASES: &[&str] = &[
    "just a moment",
    "checking your browser",
    "verify you are human",
    "prove your humanity",
    "attention required",
    "file a ticket",
];

/// One auto-handled JavaScript dialog.
#[derive(Debug, Clone)]
pub struct DialogRecord {
    /// alert, confirm, prompt, or beforeunload.
    pub kind: String,
    pub message: String,
    pub timestamp_ms: u64,
}

/// One captured console call.
#[derive(Debug, Clone)]
pub struct ConsoleRecord {
    pub level: String,
    pub text: String,
    pub timestamp_ms: u64,
}

/// A page-type target, as listed by [`Page::tabs`].
#[derive(Debug, Clone)]
pub struct TabInfo {
    pub target_id: String,
    pub url: String,
    pub title: String,
}

/// Predicate for [`Page::wait_for`].
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// `document.body.innerText` contains the string.
    Text(String),
    /// `document.querySelector` finds the selector.
    Selector(String),
}

/// Image encoding for [`Page::screenshot`].
#[derive(Debug, Clone, Copy)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// Whether a snapshot looks like a bot-challenge interstitial.
#[must_use]
pub fn looks_like_challenge(snapshot_text: &str) -> bool {
    let lower = snapshot_text.to_lowercase();
    CHALLENGE_PHRASES.iter().any(|p| lower.contains(p))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// The page handle. Owns its transport, its session, its reference map, and
/// (in headless mode) its browser process. One handle, one page.
pub struct Page {
    client: CdpClient,
    session: SessionView,
    target_id: String,
    refs: HashMap<String, i64>,
    dialogs: Arc<Mutex<Vec<DialogRecord>>>,
    console: Arc<Mutex<Vec<ConsoleRecord>>>,
    browser: Option<ChromeProcess>,
    config: SessionConfig,
    /// Cookies seeded so far, replayed after a hybrid re-attach.
    seeded_cookies: Vec<Cookie>,
}

impl Page {
    /// Create a session per the config: launch or attach a browser, create
    /// and prepare the page target, deny permission prompts, seed storage
    /// state, and install the dialog and console watchers.
    ///
    /// # Errors
    ///
    /// `NoBrowser`/`LaunchFailed` from browser acquisition,
    /// `StorageStateInvalid` for a malformed seed document, and transport
    /// errors from session setup.
    pub async fn connect(config: SessionConfig) -> Result<Self, Error> {
        let headless = config.mode != BrowserMode::Headed;

        let (ws_url, browser) = if headless {
            let executable = chrome::find_browser()?;
            let process = chrome::launch(
                &executable,
                LaunchOptions {
                    proxy: config.proxy.clone(),
                    window_size: config.viewport.map(|v| (v.width, v.height)),
                    user_data_dir: None,
                },
            )
            .await?;
            (process.ws_url().to_owned(), Some(process))
        } else {
            let version = chrome::connect_existing(config.debug_port).await?;
            (version.ws_debugger_url, None)
        };

        let client = CdpClient::connect(&ws_url, CdpConfig::default()).await?;
        let target = factory::create_page(&client, headless, config.viewport).await?;
        factory::deny_permissions(&client).await?;

        let mut page = Self {
            client,
            session: target.session,
            target_id: target.target_id,
            refs: HashMap::new(),
            dialogs: Arc::new(Mutex::new(Vec::new())),
            console: Arc::new(Mutex::new(Vec::new())),
            browser,
            config,
            seeded_cookies: Vec::new(),
        };

        page.seed_storage_state().await?;
        page.install_watchers().await;
        Ok(page)
    }

    async fn seed_storage_state(&mut self) -> Result<(), Error> {
        let Some(path) = self.config.storage_state.clone() else {
            return Ok(());
        };
        // Absent file: skip. Malformed file: hard error.
        let Some(stored) = state::load(&path)? else {
            return Ok(());
        };
        cookies::install(&self.session, &stored.cookies).await?;
        self.seeded_cookies.extend(stored.cookies);
        Ok(())
    }

    /// Dialog and console watchers run for the life of the session and feed
    /// the in-memory logs. The dialog watcher must answer every opening or
    /// page scripts would hang; everything except beforeunload is accepted.
    async fn install_watchers(&self) {
        if let Ok(mut rx) = self.session.subscribe("Page.javascriptDialogOpening").await {
            let session = self.session.clone();
            let dialogs = Arc::clone(&self.dialogs);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let kind = event.params["type"].as_str().unwrap_or("alert").to_owned();
                    let message = event.params["message"].as_str().unwrap_or("").to_owned();
                    let accept = kind != "beforeunload";
                    let _ = session
                        .send(
                            "Page.handleJavaScriptDialog",
                            Some(json!({ "accept": accept })),
                        )
                        .await;
                    if let Ok(mut log) = dialogs.lock() {
                        log.push(DialogRecord {
                            kind,
                            message,
                            timestamp_ms: now_ms(),
                        });
                    }
                }
            });
        }

        let _ = self.session.send("Runtime.enable", None).await;
        if let Ok(mut rx) = self.session.subscribe("Runtime.consoleAPICalled").await {
            let console = Arc::clone(&self.console);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let level = event.params["type"].as_str().unwrap_or("log").to_owned();
                    let text = event.params["args"]
                        .as_array()
                        .map(|args| {
                            args.iter()
                                .map(|a| {
                                    a["value"]
                                        .as_str()
                                        .map(ToOwned::to_owned)
                                        .unwrap_or_else(|| {
                                            a["description"]
                                                .as_str()
                                                .unwrap_or_default()
                                                .to_owned()
                                        })
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .unwrap_or_default();
                    if let Ok(mut log) = console.lock() {
                        log.push(ConsoleRecord {
                            level,
                            text,
                            timestamp_ms: now_ms(),
                        });
                    }
                }
            });
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate and wait for the load event, then settle briefly and run the
    /// consent pass when enabled. In hybrid mode a detected challenge page
    /// triggers one teardown and re-attach to the external browser.
    ///
    /// # Errors
    ///
    /// `NavigationFailed` when the browser rejects the navigation, `Timeout`
    /// when the load event never fires.
    pub async fn goto(&mut self, url: &str) -> Result<(), Error> {
        if self.config.mode == BrowserMode::Hybrid {
            self.browse(url).await.map(drop)
        } else {
            self.navigate_pipeline(url).await
        }
    }

    /// Navigate and return a snapshot in the configured mode. This is the
    /// hybrid fallback's home: when the headless snapshot looks like a bot
    /// challenge, tear everything down, attach to the external browser,
    /// replay cookies, navigate again, and return the second snapshot as-is
    /// whether or not it still looks challenged.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`goto`](Self::goto), plus `LaunchFailed` when
    /// the external browser cannot be reached during fallback.
    pub async fn browse(&mut self, url: &str) -> Result<String, Error> {
        self.navigate_pipeline(url).await?;
        let text = self.snapshot().await?;

        if self.config.mode == BrowserMode::Hybrid && looks_like_challenge(&text) {
            warn!(target: "agentpage::page", %url, "challenge page detected; switching to external browser");
            self.fallback_to_external().await?;
            self.navigate_pipeline(url).await?;
            // Returned as-is: the core reports challenges, it does not solve
            // them.
            return self.snapshot().await;
        }
        Ok(text)
    }

    async fn navigate_pipeline(&mut self, url: &str) -> Result<(), Error> {
        let mut load_rx = self.session.subscribe("Page.loadEventFired").await?;

        let result = self
            .session
            .send("Page.navigate", Some(json!({ "url": url })))
            .await?;
        if let Some(error_text) = result["errorText"].as_str() {
            if !error_text.is_empty() {
                return Err(Error::NavigationFailed(error_text.to_owned()));
            }
        }

        tokio::select! {
            event = load_rx.recv() => {
                if event.is_none() {
                    return Err(Error::TransportLost("event channel closed".into()));
                }
            }
            () = tokio::time::sleep(self.config.navigation_timeout) => {
                return Err(Error::Timeout { what: "Page.loadEventFired".into() });
            }
        }

        tokio::time::sleep(SETTLE_AFTER_LOAD).await;

        if self.config.dismiss_consent {
            consent::dismiss(&self.session).await;
        }

        debug!(target: "agentpage::page", %url, "navigation complete");
        Ok(())
    }

    /// Reload the current page and wait for the load event.
    ///
    /// # Errors
    ///
    /// `Timeout` when the load event never fires.
    pub async fn reload(&mut self) -> Result<(), Error> {
        let load_rx = self.session.subscribe("Page.loadEventFired").await?;
        self.session.send("Page.reload", None).await?;
        drop(
            wait_first(load_rx, self.config.navigation_timeout, "Page.loadEventFired").await?,
        );
        tokio::time::sleep(SETTLE_AFTER_LOAD).await;
        Ok(())
    }

    /// Navigate one entry back in history.
    ///
    /// # Errors
    ///
    /// `NoHistory` at the beginning of history.
    pub async fn go_back(&mut self) -> Result<(), Error> {
        self.history_step(-1, "back").await
    }

    /// Navigate one entry forward in history.
    ///
    /// # Errors
    ///
    /// `NoHistory` at the end of history.
    pub async fn go_forward(&mut self) -> Result<(), Error> {
        self.history_step(1, "forward").await
    }

    async fn history_step(&mut self, delta: i64, direction: &'static str) -> Result<(), Error> {
        let history = self.session.send("Page.getNavigationHistory", None).await?;
        let current = history["currentIndex"].as_i64().unwrap_or(0);
        let entries = history["entries"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let target_index = current + delta;
        let entry = usize::try_from(target_index)
            .ok()
            .and_then(|i| entries.get(i))
            .ok_or(Error::NoHistory { direction })?;
        let entry_id = entry["id"].as_i64().unwrap_or(0);

        let nav_rx = self.session.subscribe("Page.frameNavigated").await?;
        self.session
            .send(
                "Page.navigateToHistoryEntry",
                Some(json!({ "entryId": entry_id })),
            )
            .await?;
        drop(wait_first(nav_rx, self.config.navigation_timeout, "Page.frameNavigated").await?);
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Take a snapshot in the session's configured mode, replacing the
    /// reference map.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors fetching the accessibility tree.
    pub async fn snapshot(&mut self) -> Result<String, Error> {
        self.snapshot_with(self.config.snapshot_mode).await
    }

    /// Take a snapshot in an explicit mode, replacing the reference map.
    /// Every reference from earlier snapshots is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors fetching the accessibility tree.
    pub async fn snapshot_with(&mut self, mode: SnapshotMode) -> Result<String, Error> {
        self.session.send("Accessibility.enable", None).await?;
        let response = self
            .session
            .send("Accessibility.getFullAXTree", None)
            .await?;
        let nodes = response["nodes"].as_array().cloned().unwrap_or_default();

        let opts = match &self.config.context {
            Some(context) => PruneOptions::with_context(mode, context),
            None => PruneOptions::new(mode),
        };
        let snap = snapshot::render(&nodes, &opts);
        self.refs = snap.refs;
        Ok(snap.text)
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.session, &self.refs)
    }

    /// Click the referenced element.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when the token is not from the current snapshot.
    pub async fn click(&self, reference: &str) -> Result<(), Error> {
        self.dispatcher().click(reference).await
    }

    /// Hover the referenced element.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when the token is not from the current snapshot.
    pub async fn hover(&self, reference: &str) -> Result<(), Error> {
        self.dispatcher().hover(reference).await
    }

    /// Type into the referenced element.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when the token is not from the current snapshot.
    pub async fn type_text(
        &self,
        reference: &str,
        text: &str,
        opts: TypeOptions,
    ) -> Result<(), Error> {
        self.dispatcher().type_text(reference, text, opts).await
    }

    /// Press a symbolic key.
    ///
    /// # Errors
    ///
    /// `UnknownKey` for names outside the fixed table.
    pub async fn press(&self, key: &str) -> Result<(), Error> {
        self.dispatcher().press(key).await
    }

    /// Dispatch a wheel event.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn scroll(&self, delta_y: f64, x: Option<f64>, y: Option<f64>) -> Result<(), Error> {
        self.dispatcher().scroll(delta_y, x, y).await
    }

    /// Select an option by value or visible text.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when the token is not from the current snapshot,
    /// `OptionNotFound` when no option matches `value`.
    pub async fn select(&self, reference: &str, value: &str) -> Result<(), Error> {
        self.dispatcher().select(reference, value).await
    }

    /// Drag from one referenced element to another.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when either token is not from the current snapshot.
    pub async fn drag(&self, from: &str, to: &str) -> Result<(), Error> {
        self.dispatcher().drag(from, to).await
    }

    /// Assign files to the referenced file input.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` when the token is not from the current snapshot.
    pub async fn upload(&self, reference: &str, files: &[PathBuf]) -> Result<(), Error> {
        self.dispatcher().upload(reference, files).await
    }

    // =========================================================================
    // Waits
    // =========================================================================

    /// Wait for the next load event. SPA navigations never fire one; after
    /// the deadline this settles briefly and returns without error.
    ///
    /// # Errors
    ///
    /// Transport errors only; expiry is not an error here.
    pub async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), Error> {
        let mut rx = self.session.subscribe("Page.loadEventFired").await?;
        tokio::select! {
            _ = rx.recv() => {}
            () = tokio::time::sleep(timeout) => {
                tokio::time::sleep(SETTLE_AFTER_LOAD).await;
            }
        }
        Ok(())
    }

    /// Wait until no request has been in flight for `idle` continuously.
    ///
    /// The in-flight counter pairs request-will-be-sent against
    /// loading-finished/loading-failed and is clamped at zero: responses for
    /// requests sent before we subscribed must not drive it negative.
    ///
    /// # Errors
    ///
    /// `Timeout` at the absolute deadline.
    pub async fn wait_for_network_idle(
        &self,
        timeout: Duration,
        idle: Option<Duration>,
    ) -> Result<(), Error> {
        let idle = idle.unwrap_or(NETWORK_IDLE_THRESHOLD);
        let mut req_rx = self.session.subscribe("Network.requestWillBeSent").await?;
        let mut fin_rx = self.session.subscribe("Network.loadingFinished").await?;
        let mut fail_rx = self.session.subscribe("Network.loadingFailed").await?;

        let deadline = tokio::time::Instant::now() + timeout;
        let mut in_flight: i64 = 0;
        let idle_timer = tokio::time::sleep(idle);
        tokio::pin!(idle_timer);

        loop {
            tokio::select! {
                event = req_rx.recv() => {
                    if event.is_some() {
                        in_flight += 1;
                        idle_timer.as_mut().reset(tokio::time::Instant::now() + idle);
                    }
                }
                event = fin_rx.recv() => {
                    if event.is_some() {
                        in_flight = (in_flight - 1).max(0);
                        if in_flight == 0 {
                            idle_timer.as_mut().reset(tokio::time::Instant::now() + idle);
                        }
                    }
                }
                event = fail_rx.recv() => {
                    if event.is_some() {
                        in_flight = (in_flight - 1).max(0);
                        if in_flight == 0 {
                            idle_timer.as_mut().reset(tokio::time::Instant::now() + idle);
                        }
                    }
                }
                () = &mut idle_timer => {
                    if in_flight == 0 {
                        return Ok(());
                    }
                    idle_timer.as_mut().reset(tokio::time::Instant::now() + idle);
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(Error::Timeout { what: "network idle".into() });
                }
            }
        }
    }

    /// Poll until a text or selector condition holds.
    ///
    /// # Errors
    ///
    /// `Timeout` at the deadline.
    pub async fn wait_for(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<(), Error> {
        let deadline = tokio::time::Instant::now() + timeout;
        let expression = match condition {
            WaitCondition::Text(text) => {
                let needle = serde_json::to_string(text)
                    .map_err(|e| Error::Internal(format!("serialization error: {e}")))?;
                format!("!!document.body && document.body.innerText.includes({needle})")
            }
            WaitCondition::Selector(selector) => {
                let needle = serde_json::to_string(selector)
                    .map_err(|e| Error::Internal(format!("serialization error: {e}")))?;
                format!("document.querySelector({needle}) !== null")
            }
        };

        loop {
            let response = self
                .session
                .send(
                    "Runtime.evaluate",
                    Some(json!({ "expression": expression, "returnByValue": true })),
                )
                .await?;
            if response["result"]["value"].as_bool() == Some(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() + WAIT_POLL_INTERVAL > deadline {
                return Err(Error::Timeout {
                    what: format!("wait_for {condition:?}"),
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Capture the viewport as an image, decoded from the wire's base64.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors, or an undecodable payload.
    pub async fn screenshot(
        &self,
        format: ImageFormat,
        quality: Option<u32>,
    ) -> Result<Vec<u8>, Error> {
        let mut params = json!({
            "format": match format {
                ImageFormat::Png => "png",
                ImageFormat::Jpeg => "jpeg",
            },
        });
        if let Some(quality) = quality {
            params["quality"] = json!(quality);
        }
        let response = self
            .session
            .send("Page.captureScreenshot", Some(params))
            .await?;
        decode_payload(&response["data"])
    }

    /// Print the page to PDF with backgrounds.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors, or an undecodable payload.
    pub async fn pdf(&self, landscape: bool) -> Result<Vec<u8>, Error> {
        let response = self
            .session
            .send(
                "Page.printToPDF",
                Some(json!({ "landscape": landscape, "printBackground": true })),
            )
            .await?;
        decode_payload(&response["data"])
    }

    /// Export all cookies and the page's local key/value store to `path`.
    ///
    /// # Errors
    ///
    /// Transport errors reading state, `StorageStateInvalid` writing it.
    pub async fn save_state(&self, path: &Path) -> Result<(), Error> {
        let response = self.session.send("Network.getAllCookies", None).await?;
        let cookies = response["cookies"]
            .as_array()
            .map(|arr| arr.iter().filter_map(cookie_from_wire).collect())
            .unwrap_or_default();

        let ls_response = self
            .session
            .send(
                "Runtime.evaluate",
                Some(json!({
                    "expression": "JSON.stringify(Object.assign({}, window.localStorage))",
                    "returnByValue": true,
                })),
            )
            .await?;
        let local_storage = ls_response["result"]["value"]
            .as_str()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        state::save(
            path,
            &StorageState {
                cookies,
                local_storage,
            },
        )
    }

    /// Pull cookies for `url` from the credential source and install them.
    /// Best-effort: injection failures are logged, not raised.
    pub async fn inject_cookies(&mut self, url: &str, source: &dyn CookieSource) {
        let injected = cookies::inject_from_source(&self.session, url, source).await;
        self.seeded_cookies.extend(injected);
    }

    // =========================================================================
    // Tabs
    // =========================================================================

    /// List page-type targets in the browser.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn tabs(&self) -> Result<Vec<TabInfo>, Error> {
        let response = self.client.send("Target.getTargets", None).await?;
        let tabs = response["targetInfos"]
            .as_array()
            .map(|infos| {
                infos
                    .iter()
                    .filter(|t| t["type"].as_str() == Some("page"))
                    .map(|t| TabInfo {
                        target_id: t["targetId"].as_str().unwrap_or_default().to_owned(),
                        url: t["url"].as_str().unwrap_or_default().to_owned(),
                        title: t["title"].as_str().unwrap_or_default().to_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(tabs)
    }

    /// Activate the page-type target at `index`, as ordered by [`tabs`](Self::tabs).
    ///
    /// # Errors
    ///
    /// `Internal` when the index is out of range.
    pub async fn switch_tab(&self, index: usize) -> Result<(), Error> {
        let tabs = self.tabs().await?;
        let tab = tabs
            .get(index)
            .ok_or_else(|| Error::Internal(format!("no tab at index {index}")))?;
        self.client
            .send(
                "Target.activateTarget",
                Some(json!({ "targetId": tab.target_id })),
            )
            .await?;
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Current location, as the page sees it.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn url(&self) -> Result<String, Error> {
        self.evaluate_string("location.href").await
    }

    /// Current document title.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn title(&self) -> Result<String, Error> {
        self.evaluate_string("document.title").await
    }

    /// One-shot script evaluation, returned by value.
    ///
    /// # Errors
    ///
    /// `Internal` when the expression throws.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, Error> {
        let response = self
            .session
            .send(
                "Runtime.evaluate",
                Some(json!({ "expression": expression, "returnByValue": true })),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(Error::Internal(format!(
                "script threw: {}",
                details["text"].as_str().unwrap_or("unknown exception")
            )));
        }
        Ok(response["result"]["value"].clone())
    }

    async fn evaluate_string(&self, expression: &str) -> Result<String, Error> {
        Ok(self
            .evaluate(expression)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_owned())
    }

    /// Every JavaScript dialog auto-handled so far.
    #[must_use]
    pub fn dialog_log(&self) -> Vec<DialogRecord> {
        match self.dialogs.lock() {
            Ok(log) => log.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Every console call captured so far.
    #[must_use]
    pub fn console_log(&self) -> Vec<ConsoleRecord> {
        match self.console.lock() {
            Ok(log) => log.clone(),
            Err(_) => Vec::new(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Tear down the headless side and re-attach to the external browser on
    /// the configured debug port, replaying permissions and cookies.
    async fn fallback_to_external(&mut self) -> Result<(), Error> {
        let _ = self
            .client
            .send(
                "Target.closeTarget",
                Some(json!({ "targetId": self.target_id })),
            )
            .await;
        let _ = self.client.close().await;
        if let Some(mut process) = self.browser.take() {
            process.kill();
        }

        let version = chrome::connect_existing(self.config.debug_port).await?;
        let client = CdpClient::connect(&version.ws_debugger_url, CdpConfig::default()).await?;
        let target = factory::create_page(&client, false, self.config.viewport).await?;
        factory::deny_permissions(&client).await?;

        self.client = client;
        self.session = target.session;
        self.target_id = target.target_id;
        self.refs.clear();

        if !self.seeded_cookies.is_empty() {
            if let Err(e) = cookies::install(&self.session, &self.seeded_cookies).await {
                warn!(target: "agentpage::page", error = %e, "cookie replay failed");
            }
        }
        self.install_watchers().await;
        debug!(target: "agentpage::page", port = self.config.debug_port, "attached to external browser");
        Ok(())
    }

    /// Close the page target, tear down the transport, and kill the owned
    /// browser process. An external (headed) browser is left running.
    pub async fn close(mut self) {
        let _ = self
            .client
            .send(
                "Target.closeTarget",
                Some(json!({ "targetId": self.target_id })),
            )
            .await;
        let _ = self.client.close().await;
        if let Some(mut process) = self.browser.take() {
            process.kill();
        }
    }
}

fn decode_payload(data: &serde_json::Value) -> Result<Vec<u8>, Error> {
    let encoded = data
        .as_str()
        .ok_or_else(|| Error::Internal("capture returned no data".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::Internal(format!("undecodable capture payload: {e}")))
}

/// CDP cookie records carry extra fields and use `-1` for session cookies.
fn cookie_from_wire(v: &serde_json::Value) -> Option<Cookie> {
    let same_site = match v["sameSite"].as_str() {
        Some("Strict") => Some(crate::cookies::SameSite::Strict),
        Some("Lax") => Some(crate::cookies::SameSite::Lax),
        Some("None") => Some(crate::cookies::SameSite::None),
        _ => None,
    };
    Some(Cookie {
        name: v["name"].as_str()?.to_owned(),
        value: v["value"].as_str().unwrap_or_default().to_owned(),
        domain: v["domain"].as_str().unwrap_or_default().to_owned(),
        path: v["path"].as_str().unwrap_or("/").to_owned(),
        expires: v["expires"].as_f64().filter(|e| *e > 0.0),
        secure: v["secure"].as_bool().unwrap_or(false),
        http_only: v["httpOnly"].as_bool().unwrap_or(false),
        same_site,
    })
}

async fn wait_first(
    mut rx: tokio::sync::mpsc::Receiver<crate::cdp::CdpEvent>,
    timeout: Duration,
    what: &str,
) -> Result<serde_json::Value, Error> {
    tokio::select! {
        event = rx.recv() => match event {
            Some(event) => Ok(event.params),
            None => Err(Error::TransportLost("event channel closed".into())),
        },
        () = tokio::time::sleep(timeout) => Err(Error::Timeout { what: what.to_owned() }),
    }
}
