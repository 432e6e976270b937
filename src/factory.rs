//! Page factory: create the page target, attach a flattened session, enable
//! the domains the rest of the core needs, and apply stealth, viewport and
//! permission suppression.

use serde_json::json;
use tracing::{debug, warn};

use crate::cdp::{CdpClient, CdpError, SessionView};
use crate::config::Viewport;
use crate::error::Error;
use crate::stealth;

/// Permission categories denied on every new page, before navigation.
/// Categories this browser version does not recognize are skipped.
const DENIED_PERMISSIONS: &[&str] = &[
    "geolocation",
    "notifications",
    "midi",
    "durableStorage",
    "audioCapture",
    "videoCapture",
    "backgroundSync",
    "sensors",
    "idleDetection",
];

/// A created page target and the session attached to it.
pub struct PageTarget {
    pub target_id: String,
    pub session: SessionView,
}

/// Create a blank page target, flat-attach it, and prepare the session:
/// Page/Network/DOM domains, stealth (headless only), optional viewport.
///
/// # Errors
///
/// Transport and protocol errors from target creation or domain enabling.
pub async fn create_page(
    client: &CdpClient,
    headless: bool,
    viewport: Option<Viewport>,
) -> Result<PageTarget, Error> {
    let created = client
        .send("Target.createTarget", Some(json!({ "url": "about:blank" })))
        .await?;
    let target_id = created["targetId"]
        .as_str()
        .ok_or_else(|| Error::Internal("Target.createTarget returned no targetId".into()))?
        .to_owned();

    let session = client.attach(&target_id).await?;
    debug!(target: "agentpage::factory", %target_id, session = session.session_id(), "page attached");

    for domain in ["Page", "Network", "DOM"] {
        session.send(&format!("{domain}.enable"), None).await?;
    }

    if headless {
        stealth::install(&session).await?;
    }

    if let Some(vp) = viewport {
        session
            .send(
                "Emulation.setDeviceMetricsOverride",
                Some(json!({
                    "width": vp.width,
                    "height": vp.height,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                })),
            )
            .await?;
    }

    Ok(PageTarget { target_id, session })
}

/// Deny the fixed permission list at browser level so nothing ever prompts.
/// Unrecognized permission types are silently skipped; transport loss still
/// fails.
///
/// # Errors
///
/// Returns transport errors; protocol rejections of individual permission
/// types do not fail the call.
pub async fn deny_permissions(client: &CdpClient) -> Result<(), Error> {
    for name in DENIED_PERMISSIONS {
        let result = client
            .send(
                "Browser.setPermission",
                Some(json!({
                    "permission": { "name": name },
                    "setting": "denied",
                })),
            )
            .await;
        match result {
            Ok(_) => {}
            Err(CdpError::Protocol { message, .. }) => {
                warn!(target: "agentpage::factory", permission = name, %message, "permission type skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
