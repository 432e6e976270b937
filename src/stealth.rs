//! The stealth script installed on headless pages before any page script
//! runs. It redefines a small, fixed set of properties that headless builds
//! expose differently from a desktop browser.

use crate::cdp::SessionView;
use crate::error::Error;

/// Runs in every new document before page scripts. Fixed set: webdriver
/// flag, plugins list, languages list, the Chrome runtime object, and the
/// notifications branch of the permissions query.
pub const STEALTH_SCRIPT: &str = r"(() => {
  Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
  Object.defineProperty(navigator, 'plugins', {
    get: () => [1, 2, 3, 4, 5],
  });
  Object.defineProperty(navigator, 'languages', {
    get: () => ['en-US', 'en'],
  });
  window.chrome = { runtime: {} };
  const originalQuery = window.navigator.permissions.query.bind(window.navigator.permissions);
  window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);
})();";

/// Register the stealth script to run before page scripts on the target.
///
/// # Errors
///
/// Transport and protocol errors from the registration call.
pub async fn install(session: &SessionView) -> Result<(), Error> {
    session
        .send(
            "Page.addScriptToEvaluateOnNewDocument",
            Some(serde_json::json!({ "source": STEALTH_SCRIPT })),
        )
        .await?;
    Ok(())
}
