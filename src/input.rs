//! Reference-based input dispatch: resolve a `[ref=N]` token to a DOM node,
//! then turn an intent into the right sequence of CDP `Input` events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;

use crate::cdp::SessionView;
use crate::error::Error;

/// Default wheel-event coordinates when the caller gives none.
const DEFAULT_SCROLL_POINT: (f64, f64) = (400.0, 300.0);

/// Settle delay after opening a custom dropdown before searching options.
const DROPDOWN_SETTLE: Duration = Duration::from_millis(300);

/// CDP modifier bitmask for Control.
const MODIFIER_CTRL: i64 = 2;

// =============================================================================
// Key table
// =============================================================================

/// One row of the fixed key table.
#[derive(Debug)]
pub struct KeySpec {
    pub name: &'static str,
    pub key: &'static str,
    pub code: &'static str,
    pub key_code: i64,
    /// Text payload for keys that produce characters.
    pub text: Option<&'static str>,
}

/// Every key name `press` accepts. Anything else is `UnknownKey`.
const KEY_TABLE: &[KeySpec] = &[
    KeySpec { name: "Enter", key: "Enter", code: "Enter", key_code: 13, text: Some("\r") },
    KeySpec { name: "Tab", key: "Tab", code: "Tab", key_code: 9, text: Some("\t") },
    KeySpec { name: "Escape", key: "Escape", code: "Escape", key_code: 27, text: None },
    KeySpec { name: "Backspace", key: "Backspace", code: "Backspace", key_code: 8, text: None },
    KeySpec { name: "Delete", key: "Delete", code: "Delete", key_code: 46, text: None },
    KeySpec { name: "ArrowUp", key: "ArrowUp", code: "ArrowUp", key_code: 38, text: None },
    KeySpec { name: "ArrowDown", key: "ArrowDown", code: "ArrowDown", key_code: 40, text: None },
    KeySpec { name: "ArrowLeft", key: "ArrowLeft", code: "ArrowLeft", key_code: 37, text: None },
    KeySpec { name: "ArrowRight", key: "ArrowRight", code: "ArrowRight", key_code: 39, text: None },
    KeySpec { name: "Home", key: "Home", code: "Home", key_code: 36, text: None },
    KeySpec { name: "End", key: "End", code: "End", key_code: 35, text: None },
    KeySpec { name: "PageUp", key: "PageUp", code: "PageUp", key_code: 33, text: None },
    KeySpec { name: "PageDown", key: "PageDown", code: "PageDown", key_code: 34, text: None },
    KeySpec { name: "Space", key: " ", code: "Space", key_code: 32, text: Some(" ") },
];

/// Valid key names, in table order.
#[must_use]
pub fn key_names() -> Vec<&'static str> {
    KEY_TABLE.iter().map(|k| k.name).collect()
}

/// Look up a symbolic key name.
///
/// # Errors
///
/// Returns `Error::UnknownKey` for names outside the table.
pub fn lookup_key(name: &str) -> Result<&'static KeySpec, Error> {
    KEY_TABLE
        .iter()
        .find(|k| k.name == name)
        .ok_or_else(|| Error::UnknownKey { key: name.into() })
}

// =============================================================================
// Typing options
// =============================================================================

/// Options for `type_text`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeOptions {
    /// Select-all + Backspace before typing.
    pub clear: bool,
    /// Emit keyDown/keyUp per character instead of one `insertText` batch.
    /// The batch path is faster but does not fire per-key handlers.
    pub key_events: bool,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Input dispatcher bound to one session and one snapshot's reference map.
pub struct Dispatcher<'a> {
    session: &'a SessionView,
    refs: &'a HashMap<String, i64>,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(session: &'a SessionView, refs: &'a HashMap<String, i64>) -> Self {
        Self { session, refs }
    }

    /// Resolve a reference token against the current snapshot's map.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReferenceUnknown` when the token is not in the map.
    pub fn resolve(&self, reference: &str) -> Result<i64, Error> {
        self.refs
            .get(reference)
            .copied()
            .ok_or_else(|| Error::ReferenceUnknown(reference.to_owned()))
    }

    /// Scroll the node into view, then compute the midpoint of its content
    /// quad from the box model.
    async fn center(&self, backend_id: i64) -> Result<(f64, f64), Error> {
        self.session
            .send(
                "DOM.scrollIntoViewIfNeeded",
                Some(json!({ "backendNodeId": backend_id })),
            )
            .await?;

        let response = self
            .session
            .send("DOM.getBoxModel", Some(json!({ "backendNodeId": backend_id })))
            .await?;

        let content = response["model"]["content"]
            .as_array()
            .filter(|quad| quad.len() >= 8)
            .ok_or_else(|| Error::Internal("box model has no content quad".into()))?;

        // Quad order: [x1, y1, x2, y2, x3, y3, x4, y4].
        let x1 = content[0].as_f64().unwrap_or(0.0);
        let y1 = content[1].as_f64().unwrap_or(0.0);
        let x3 = content[4].as_f64().unwrap_or(0.0);
        let y3 = content[5].as_f64().unwrap_or(0.0);
        Ok(((x1 + x3) / 2.0, (y1 + y3) / 2.0))
    }

    async fn mouse_event(
        &self,
        kind: &str,
        x: f64,
        y: f64,
        button: Option<&str>,
    ) -> Result<(), Error> {
        let mut params = json!({ "type": kind, "x": x, "y": y });
        if let Some(button) = button {
            params["button"] = json!(button);
            params["clickCount"] = json!(1);
        }
        self.session
            .send("Input.dispatchMouseEvent", Some(params))
            .await?;
        Ok(())
    }

    /// Left-click the midpoint of the referenced element.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` for a stale token; transport and protocol errors
    /// otherwise.
    pub async fn click(&self, reference: &str) -> Result<(), Error> {
        let backend_id = self.resolve(reference)?;
        let (x, y) = self.center(backend_id).await?;
        self.mouse_event("mousePressed", x, y, Some("left")).await?;
        self.mouse_event("mouseReleased", x, y, Some("left")).await
    }

    /// Move the mouse over the referenced element.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`click`](Self::click).
    pub async fn hover(&self, reference: &str) -> Result<(), Error> {
        let backend_id = self.resolve(reference)?;
        let (x, y) = self.center(backend_id).await?;
        self.mouse_event("mouseMoved", x, y, None).await
    }

    /// Focus the referenced element and type into it.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` for a stale token; transport and protocol errors
    /// otherwise.
    pub async fn type_text(
        &self,
        reference: &str,
        text: &str,
        opts: TypeOptions,
    ) -> Result<(), Error> {
        let backend_id = self.resolve(reference)?;
        self.session
            .send("DOM.focus", Some(json!({ "backendNodeId": backend_id })))
            .await?;

        if opts.clear {
            self.key_event("keyDown", "a", "KeyA", 65, None, MODIFIER_CTRL).await?;
            self.key_event("keyUp", "a", "KeyA", 65, None, MODIFIER_CTRL).await?;
            let bs = lookup_key("Backspace")?;
            self.key_event("keyDown", bs.key, bs.code, bs.key_code, bs.text, 0).await?;
            self.key_event("keyUp", bs.key, bs.code, bs.key_code, bs.text, 0).await?;
        }

        if opts.key_events {
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                let s: &str = ch.encode_utf8(&mut buf);
                self.char_key_event("keyDown", s).await?;
                self.char_key_event("keyUp", s).await?;
            }
            Ok(())
        } else {
            self.session
                .send("Input.insertText", Some(json!({ "text": text })))
                .await?;
            Ok(())
        }
    }

    async fn char_key_event(&self, kind: &str, ch: &str) -> Result<(), Error> {
        self.session
            .send(
                "Input.dispatchKeyEvent",
                Some(json!({ "type": kind, "key": ch, "text": ch })),
            )
            .await?;
        Ok(())
    }

    async fn key_event(
        &self,
        kind: &str,
        key: &str,
        code: &str,
        key_code: i64,
        text: Option<&str>,
        modifiers: i64,
    ) -> Result<(), Error> {
        let mut params = json!({
            "type": kind,
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": key_code,
            "nativeVirtualKeyCode": key_code,
        });
        if modifiers != 0 {
            params["modifiers"] = json!(modifiers);
        }
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.session
            .send("Input.dispatchKeyEvent", Some(params))
            .await?;
        Ok(())
    }

    /// Press a symbolic key from the fixed table: keyDown then keyUp.
    ///
    /// # Errors
    ///
    /// `Error::UnknownKey` for names outside the table.
    pub async fn press(&self, key_name: &str) -> Result<(), Error> {
        let spec = lookup_key(key_name)?;
        self.key_event("keyDown", spec.key, spec.code, spec.key_code, spec.text, 0)
            .await?;
        self.key_event("keyUp", spec.key, spec.code, spec.key_code, spec.text, 0)
            .await
    }

    /// Dispatch a mouse-wheel event at `(x, y)`, defaulting to the middle of
    /// a typical viewport.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn scroll(
        &self,
        delta_y: f64,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<(), Error> {
        let params = json!({
            "type": "mouseWheel",
            "x": x.unwrap_or(DEFAULT_SCROLL_POINT.0),
            "y": y.unwrap_or(DEFAULT_SCROLL_POINT.1),
            "deltaX": 0.0,
            "deltaY": delta_y,
        });
        self.session
            .send("Input.dispatchMouseEvent", Some(params))
            .await?;
        Ok(())
    }

    /// Select an option by value or visible text.
    ///
    /// Native `<select>` elements are driven through script (set `.value`,
    /// dispatch a bubbling `change`). Anything else is treated as a custom
    /// dropdown: click it, wait for it to open, then click the option or
    /// menu item whose trimmed text equals `value`.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` for a stale token; `OptionNotFound` when neither
    /// path finds an option matching `value`; transport and protocol errors
    /// otherwise.
    pub async fn select(&self, reference: &str, value: &str) -> Result<(), Error> {
        let backend_id = self.resolve(reference)?;
        let object_id = self.object_id(backend_id).await?;

        let response = self
            .session
            .send(
                "Runtime.callFunctionOn",
                Some(json!({
                    "objectId": object_id,
                    "functionDeclaration": NATIVE_SELECT_FN,
                    "arguments": [{ "value": value }],
                    "returnByValue": true,
                })),
            )
            .await?;

        if response["result"]["value"].as_bool() == Some(true) {
            return Ok(());
        }

        // Custom dropdown: open it, let it render, pick the option by text.
        self.click(reference).await?;
        tokio::time::sleep(DROPDOWN_SETTLE).await;

        let needle = serde_json::to_string(value)
            .map_err(|e| Error::Internal(format!("serialization error: {e}")))?;
        let expr = format!(
            "(() => {{\n  const value = {needle};\n  const nodes = document.querySelectorAll('[role=\"option\"], [role=\"menuitem\"]');\n  for (const el of nodes) {{\n    if ((el.textContent || '').trim() === value) {{ el.click(); return true; }}\n  }}\n  return false;\n}})()"
        );
        let response = self
            .session
            .send(
                "Runtime.evaluate",
                Some(json!({ "expression": expr, "returnByValue": true })),
            )
            .await?;
        if response["result"]["value"].as_bool() == Some(true) {
            return Ok(());
        }
        Err(Error::OptionNotFound {
            value: value.to_owned(),
        })
    }

    /// Drag from one referenced element to another: press at the source,
    /// move through the midpoint, release at the target.
    ///
    /// Synthetic CDP mouse events do not populate the HTML5 drag-and-drop
    /// data transfer; page scripts listening for `dragstart`/`drop` may not
    /// observe this sequence.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` for a stale token; transport and protocol errors
    /// otherwise.
    pub async fn drag(&self, from: &str, to: &str) -> Result<(), Error> {
        let from_backend = self.resolve(from)?;
        let to_backend = self.resolve(to)?;
        let (fx, fy) = self.center(from_backend).await?;
        let (tx, ty) = self.center(to_backend).await?;

        self.mouse_event("mousePressed", fx, fy, Some("left")).await?;
        self.mouse_event("mouseMoved", (fx + tx) / 2.0, (fy + ty) / 2.0, None)
            .await?;
        self.mouse_event("mouseMoved", tx, ty, None).await?;
        self.mouse_event("mouseReleased", tx, ty, Some("left")).await
    }

    /// Assign files to the referenced file input.
    ///
    /// # Errors
    ///
    /// `ReferenceUnknown` for a stale token; transport and protocol errors
    /// otherwise.
    pub async fn upload(&self, reference: &str, files: &[PathBuf]) -> Result<(), Error> {
        let backend_id = self.resolve(reference)?;
        let paths: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        self.session
            .send(
                "DOM.setFileInputFiles",
                Some(json!({ "files": paths, "backendNodeId": backend_id })),
            )
            .await?;
        Ok(())
    }

    async fn object_id(&self, backend_id: i64) -> Result<String, Error> {
        let response = self
            .session
            .send("DOM.resolveNode", Some(json!({ "backendNodeId": backend_id })))
            .await?;
        response["object"]["objectId"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Internal("DOM.resolveNode returned no objectId".into()))
    }
}

/// Script run against the element itself for native `<select>` handling.
/// Returns true only when the element is a SELECT and an option matched;
/// anything else falls through to the custom-dropdown path.
const NATIVE_SELECT_FN: &str = "function(value) {\n  if (this.tagName !== 'SELECT') { return false; }\n  const match = Array.from(this.options)\n    .find(o => o.value === value || (o.textContent || '').trim() === value);\n  if (match) {\n    this.value = match.value;\n    this.dispatchEvent(new Event('change', { bubbles: true }));\n  }\n  return !!match;\n}";
