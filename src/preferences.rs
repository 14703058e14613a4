//! Persisted client preferences.
//!
//! A small JSON object on disk standing in for browser local storage. Only
//! the dark-mode flag is used; unknown keys are preserved on write.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Storage key of the dark-mode flag.
pub const DARK_MODE_KEY: &str = "darkMode";

/// Errors raised while reading or writing preferences.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a JSON object.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for preference operations.
pub type PreferenceResult<T> = Result<T, PreferenceError>;

/// Key/value preferences persisted to a JSON file.
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl PreferenceStore {
    /// Open the store at `path`. A missing or empty file means no preferences.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> PreferenceResult<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    /// Current dark-mode preference; false when unset.
    #[must_use]
    pub fn dark_mode(&self) -> bool {
        self.values
            .get(DARK_MODE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Set and persist the dark-mode preference.
    ///
    /// The in-memory value only changes once the file is written.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn set_dark_mode(&mut self, enabled: bool) -> PreferenceResult<()> {
        let mut next = self.values.clone();
        next.insert(DARK_MODE_KEY.to_string(), Value::Bool(enabled));
        self.persist(&next).await?;
        self.values = next;
        Ok(())
    }

    /// Flip and persist the dark-mode preference, returning the new value.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written; the preference is then unchanged.
    pub async fn toggle_dark_mode(&mut self) -> PreferenceResult<bool> {
        let enabled = !self.dark_mode();
        self.set_dark_mode(enabled).await?;
        tracing::debug!(enabled, "dark mode toggled");
        Ok(enabled)
    }

    async fn persist(&self, values: &BTreeMap<String, Value>) -> PreferenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(values)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_defaults_to_light() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("prefs.json")).unwrap();
        assert!(!store.dark_mode());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_persisted_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PreferenceStore::open(&path).unwrap();
        let original = store.dark_mode();
        assert_eq!(store.toggle_dark_mode().await.unwrap(), !original);
        assert_eq!(store.toggle_dark_mode().await.unwrap(), original);

        let reopened = PreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.dark_mode(), original);
    }

    #[tokio::test]
    async fn test_value_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        PreferenceStore::open(&path)
            .unwrap()
            .set_dark_mode(true)
            .await
            .unwrap();

        assert!(PreferenceStore::open(&path).unwrap().dark_mode());
    }

    #[tokio::test]
    async fn test_unknown_keys_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"fontSize": 14}"#).unwrap();

        let mut store = PreferenceStore::open(&path).unwrap();
        store.toggle_dark_mode().await.unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["fontSize"], 14);
        assert_eq!(raw[DARK_MODE_KEY], true);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            PreferenceStore::open(&path),
            Err(PreferenceError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_preference_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("sub");
        let mut store = PreferenceStore::open(blocked.join("prefs.json")).unwrap();

        // A regular file where the parent directory should be.
        fs::write(&blocked, "not a directory").unwrap();

        assert!(store.toggle_dark_mode().await.is_err());
        assert!(!store.dark_mode());
        assert!(store.set_dark_mode(true).await.is_err());
        assert!(!store.dark_mode());

        fs::remove_file(&blocked).unwrap();
        assert!(store.toggle_dark_mode().await.unwrap());
        assert!(store.dark_mode());
    }
}
