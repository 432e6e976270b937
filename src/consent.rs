//! Best-effort consent dismissal: after a page loads, walk its accessibility
//! tree for an accept control inside a consent container and click it
//! through script, which works even under click-intercepting overlays.

use serde_json::json;
use tracing::{debug, warn};

use crate::cdp::SessionView;
use crate::snapshot::{AxNode, build_tree};

/// Accept-control names, lowercased, across the locales consent banners
/// commonly ship in.
const ACCEPT_WORDS: &[&str] = &[
    "accept all",
    "accept cookies",
    "accept",
    "i agree",
    "agree",
    "allow all",
    "allow cookies",
    "got it",
    "alle akzeptieren",
    "akzeptieren",
    "zustimmen",
    "tout accepter",
    "accepter",
    "aceptar todo",
    "aceptar",
    "accetta tutto",
    "accetta",
    "alles accepteren",
    "accepteren",
    "zgadzam się",
    "godkänn",
];

/// Names marking a consent container.
const CONTAINER_HINTS: &[&str] = &["cookie", "consent", "gdpr", "privacy"];

/// Roles that can host a consent banner.
const CONTAINER_ROLES: &[&str] = &["dialog", "alertdialog", "region", "banner", "group", "generic"];

fn is_accept_control(node: &AxNode) -> bool {
    if node.role != "button" && node.role != "link" {
        return false;
    }
    let name = node.name.to_lowercase();
    ACCEPT_WORDS.iter().any(|w| name.contains(w))
}

fn is_consent_container(node: &AxNode) -> bool {
    if !CONTAINER_ROLES.contains(&node.role.as_str()) {
        return false;
    }
    let name = node.name.to_lowercase();
    CONTAINER_HINTS.iter().any(|h| name.contains(h))
}

/// Pick the accept control to click: controls inside a recognized consent
/// container win over bare matches anywhere on the page.
fn find_accept_target(root: &AxNode) -> Option<i64> {
    fn find_in(node: &AxNode, inside_container: bool, fallback: &mut Option<i64>) -> Option<i64> {
        let in_container = inside_container || is_consent_container(node);
        if is_accept_control(node) {
            if let Some(backend) = node.backend_id {
                if in_container {
                    return Some(backend);
                }
                fallback.get_or_insert(backend);
            }
        }
        node.children
            .iter()
            .find_map(|c| find_in(c, in_container, fallback))
    }

    let mut fallback = None;
    find_in(root, false, &mut fallback).or(fallback)
}

/// Run the dismissal pass. Best-effort by contract: every failure is logged
/// and swallowed; the return value only says whether something was clicked.
pub async fn dismiss(session: &SessionView) -> bool {
    match try_dismiss(session).await {
        Ok(clicked) => clicked,
        Err(e) => {
            warn!(target: "agentpage::consent", error = %e, "consent pass failed");
            false
        }
    }
}

async fn try_dismiss(session: &SessionView) -> Result<bool, crate::cdp::CdpError> {
    session.send("Accessibility.enable", None).await?;
    let response = session.send("Accessibility.getFullAXTree", None).await?;
    let nodes = response["nodes"].as_array().cloned().unwrap_or_default();
    let build = build_tree(&nodes);

    let Some(root) = build.root else {
        return Ok(false);
    };
    let Some(backend_id) = find_accept_target(&root) else {
        return Ok(false);
    };

    // Script-path click: bypasses any overlay sitting over the control.
    let resolved = session
        .send("DOM.resolveNode", Some(json!({ "backendNodeId": backend_id })))
        .await?;
    let Some(object_id) = resolved["object"]["objectId"].as_str() else {
        return Ok(false);
    };
    session
        .send(
            "Runtime.callFunctionOn",
            Some(json!({
                "objectId": object_id,
                "functionDeclaration": "function() { this.click(); }",
            })),
        )
        .await?;
    debug!(target: "agentpage::consent", backend_id, "consent control clicked");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(role: &str, name: &str, backend: Option<i64>, children: Vec<AxNode>) -> AxNode {
        AxNode {
            id: 0,
            role: role.into(),
            name: name.into(),
            properties: Vec::new(),
            ignored: false,
            backend_id: backend,
            children,
        }
    }

    #[test]
    fn accept_control_matching_is_multilingual() {
        assert!(is_accept_control(&node("button", "Accept all", None, Vec::new())));
        assert!(is_accept_control(&node("button", "Alle akzeptieren", None, Vec::new())));
        assert!(is_accept_control(&node("link", "Tout accepter", None, Vec::new())));
        assert!(!is_accept_control(&node("button", "Settings", None, Vec::new())));
        assert!(!is_accept_control(&node("StaticText", "accept", None, Vec::new())));
    }

    #[test]
    fn container_match_prefers_scoped_control() {
        let root = node(
            "RootWebArea",
            "",
            None,
            vec![
                node("button", "Accept terms of service", Some(11), Vec::new()),
                node(
                    "dialog",
                    "Cookie preferences",
                    None,
                    vec![node("button", "Accept all", Some(22), Vec::new())],
                ),
            ],
        );
        assert_eq!(find_accept_target(&root), Some(22));
    }

    #[test]
    fn bare_match_is_the_fallback() {
        let root = node(
            "RootWebArea",
            "",
            None,
            vec![node("button", "I agree", Some(33), Vec::new())],
        );
        assert_eq!(find_accept_target(&root), Some(33));
    }

    #[test]
    fn no_match_yields_nothing() {
        let root = node(
            "RootWebArea",
            "",
            None,
            vec![node("button", "Checkout", Some(44), Vec::new())],
        );
        assert_eq!(find_accept_target(&root), None);
    }

    #[test]
    fn control_without_backend_id_cannot_be_clicked() {
        let root = node(
            "RootWebArea",
            "",
            None,
            vec![node(
                "dialog",
                "Cookie notice",
                None,
                vec![node("button", "Accept all", None, Vec::new())],
            )],
        );
        assert_eq!(find_accept_target(&root), None);
    }
}
