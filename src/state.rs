//! The persisted storage-state document: cookies plus the page's local
//! key/value store, exported for re-seeding a later session.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cookies::Cookie;
use crate::error::Error;

/// Storage-state document. Fields this version does not know are ignored on
/// import.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default, rename = "localStorage")]
    pub local_storage: BTreeMap<String, String>,
}

/// Load a storage-state document.
///
/// A missing file is `Ok(None)` so callers can seed opportunistically.
///
/// # Errors
///
/// Returns `Error::StorageStateInvalid` when the file exists but cannot be
/// parsed, or an I/O failure occurs reading it.
pub fn load(path: &Path) -> Result<Option<StorageState>, Error> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::StorageStateInvalid(e.to_string())),
    }
}

/// Parse a storage-state document from its JSON text.
///
/// # Errors
///
/// Returns `Error::StorageStateInvalid` on malformed JSON.
pub fn parse(contents: &str) -> Result<StorageState, Error> {
    serde_json::from_str(contents).map_err(|e| Error::StorageStateInvalid(e.to_string()))
}

/// Write a storage-state document, creating parent directories as needed.
///
/// # Errors
///
/// Returns `Error::StorageStateInvalid` when the document cannot be written.
pub fn save(path: &Path, state: &StorageState) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::StorageStateInvalid(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::StorageStateInvalid(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| Error::StorageStateInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = StorageState::default();
        state.cookies.push(Cookie {
            name: "sid".into(),
            value: "abc".into(),
            domain: ".example.com".into(),
            path: "/".into(),
            expires: Some(1_893_456_000.0),
            secure: true,
            http_only: true,
            same_site: None,
        });
        state
            .local_storage
            .insert("cart".into(), "[1,2,3]".into());

        save(&path, &state).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.cookies[0].name, "sid");
        assert_eq!(loaded.local_storage.get("cart").map(String::as_str), Some("[1,2,3]"));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(&dir.path().join("absent.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(Error::StorageStateInvalid(_))));
    }

    #[test]
    fn unknown_fields_are_ignored_on_import() {
        let doc = r#"{
            "cookies": [],
            "localStorage": {"k": "v"},
            "sessionStorage": {"ignored": "yes"},
            "origins": []
        }"#;
        let state = parse(doc).unwrap();
        assert_eq!(state.local_storage.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn empty_document_defaults() {
        let state = parse("{}").unwrap();
        assert!(state.cookies.is_empty());
        assert!(state.local_storage.is_empty());
    }
}
