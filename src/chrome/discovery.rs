use std::io::Read;

use serde::Deserialize;

use super::ChromeError;

/// Payload of the browser's `/json/version` discovery endpoint.
#[derive(Debug, Deserialize)]
pub struct BrowserVersion {
    /// Browser name and version, e.g. `Chrome/132.0.6834.83`.
    #[serde(rename = "Browser")]
    pub browser: String,

    /// Browser-level WebSocket debugger URL.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_debugger_url: String,
}

/// Obtain the WebSocket URL of an already-running browser that exposes a
/// debug port on loopback.
///
/// # Errors
///
/// Returns `ChromeError::HttpError` if the endpoint is unreachable or
/// `ChromeError::ParseError` if the response is not the expected document.
pub async fn connect_existing(port: u16) -> Result<BrowserVersion, ChromeError> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let body = tokio::task::spawn_blocking(move || http_get(&url))
        .await
        .map_err(|e| ChromeError::HttpError(format!("discovery task failed: {e}")))??;
    parse_version(&body)
}

fn http_get(url: &str) -> Result<String, ChromeError> {
    let mut response = ureq::get(url)
        .call()
        .map_err(|e| ChromeError::HttpError(e.to_string()))?;
    let mut body = String::new();
    response
        .body_mut()
        .as_reader()
        .read_to_string(&mut body)
        .map_err(|e| ChromeError::HttpError(e.to_string()))?;
    Ok(body)
}

fn parse_version(body: &str) -> Result<BrowserVersion, ChromeError> {
    serde_json::from_str(body).map_err(|e| ChromeError::ParseError(e.to_string()))
}
