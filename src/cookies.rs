//! Cookie records and the credential sink that installs them on a session
//! before navigation.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::cdp::SessionView;
use crate::error::Error;

/// `SameSite` policy, in the browser's own spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

/// One credential record. Produced by a [`CookieSource`], consumed by the
/// sink; the core never mutates it. Field names round-trip through the wire
/// protocol untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Absolute expiry in epoch seconds; `None` is a session cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

fn default_path() -> String {
    "/".into()
}

/// The pluggable credential source. The sole contract: produce cookies for a
/// domain. Decryption, disk formats, browser stores are all on the far side
/// of this boundary.
pub trait CookieSource {
    fn cookies_for(&self, domain: &str) -> Vec<Cookie>;
}

/// Registrable-domain normalization: the host with a leading `www.` removed,
/// so cookies scoped to the registrable domain are visible.
#[must_use]
pub fn normalized_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_owned())
}

/// Domain-match a cookie against a host per the usual suffix rules.
#[must_use]
pub fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let cookie_domain = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain);
    host == cookie_domain || host.ends_with(&format!(".{cookie_domain}"))
}

impl Cookie {
    fn to_set_cookie_params(&self) -> serde_json::Value {
        let mut v = json!({
            "name": self.name,
            "value": self.value,
            "domain": self.domain,
            "path": self.path,
            "secure": self.secure,
            "httpOnly": self.http_only,
        });
        if let Some(expires) = self.expires {
            v["expires"] = json!(expires);
        }
        if let Some(same_site) = self.same_site {
            v["sameSite"] = json!(format!("{same_site:?}"));
        }
        v
    }
}

/// Install a cookie batch on the session.
///
/// # Errors
///
/// Transport and protocol errors from `Network.setCookies`.
pub async fn install(session: &SessionView, cookies: &[Cookie]) -> Result<(), Error> {
    if cookies.is_empty() {
        return Ok(());
    }
    let batch: Vec<serde_json::Value> =
        cookies.iter().map(Cookie::to_set_cookie_params).collect();
    session
        .send("Network.setCookies", Some(json!({ "cookies": batch })))
        .await?;
    debug!(target: "agentpage::cookies", count = cookies.len(), "cookies installed");
    Ok(())
}

/// Query the source for a URL's registrable domain, filter by domain match,
/// and install the result. Best-effort: failures are logged, not raised.
///
/// Returns the cookies that were installed, so a hybrid re-attach can replay
/// them.
pub async fn inject_from_source(
    session: &SessionView,
    url: &str,
    source: &dyn CookieSource,
) -> Vec<Cookie> {
    let Some(host) = normalized_host(url) else {
        warn!(target: "agentpage::cookies", %url, "not a host-bearing URL; skipping injection");
        return Vec::new();
    };

    let cookies: Vec<Cookie> = source
        .cookies_for(&host)
        .into_iter()
        .filter(|c| domain_matches(&c.domain, &host))
        .collect();

    if let Err(e) = install(session, &cookies).await {
        warn!(target: "agentpage::cookies", error = %e, "cookie injection failed");
        return Vec::new();
    }
    cookies
}
