//! Credential storage
//!
//! The gateway never touches ambient state: it is handed a [`Session`] and
//! reads, writes and clears credentials only through [`TokenStore`].

use super::error::ClientError;
use katara_core::persist::{read_json, remove_file, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Bearer credentials for one session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return Err(ClientError::Store(
                "refusing to store a partial credential pair".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Storage for the session's credential pair
///
/// Implementations replace both tokens in one step: a reader sees either the
/// old pair or the new one.
pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` when signed out
    fn read(&self) -> Option<CredentialPair>;

    /// Replace the stored pair
    fn write(&self, pair: CredentialPair) -> Result<(), ClientError>;

    /// Remove both tokens
    fn clear(&self) -> Result<(), ClientError>;

    /// Whether an access token is present
    fn is_authenticated(&self) -> bool {
        self.read().is_some_and(|pair| !pair.access_token.is_empty())
    }
}

/// Shared handle the gateway and the front end both hold
pub type Session = Arc<dyn TokenStore>;

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// In-memory store; credentials last as long as the process
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with a pair
    #[must_use]
    pub const fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }

    /// Wrap in a shareable session handle
    #[must_use]
    pub fn into_session(self) -> Session {
        Arc::new(self)
    }
}

impl TokenStore for MemoryTokenStore {
    fn read(&self) -> Option<CredentialPair> {
        read_lock(&self.pair).clone()
    }

    fn write(&self, pair: CredentialPair) -> Result<(), ClientError> {
        pair.validate()?;
        *write_lock(&self.pair) = Some(pair);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *write_lock(&self.pair) = None;
        Ok(())
    }
}

/// Store that survives restarts as a JSON file
///
/// The file is read once when opened; writes go to a temp file that is
/// renamed over the old one before the cached copy is updated.
pub struct FileTokenStore {
    path: PathBuf,
    pair: RwLock<Option<CredentialPair>>,
}

impl FileTokenStore {
    /// Open the store; a missing or malformed file means signed out
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pair = read_json::<CredentialPair>(&path).filter(|pair| pair.validate().is_ok());
        debug!(
            "Opened token store at {} (authenticated: {})",
            path.display(),
            pair.is_some()
        );
        Self {
            path,
            pair: RwLock::new(pair),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap in a shareable session handle
    #[must_use]
    pub fn into_session(self) -> Session {
        Arc::new(self)
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Option<CredentialPair> {
        read_lock(&self.pair).clone()
    }

    fn write(&self, pair: CredentialPair) -> Result<(), ClientError> {
        pair.validate()?;
        let mut guard = write_lock(&self.pair);
        write_json_atomic(&self.path, &pair)?;
        *guard = Some(pair);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut guard = write_lock(&self.pair);
        *guard = None;
        remove_file(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryTokenStore::new();
        assert!(store.read().is_none());
        assert!(!store.is_authenticated());

        store.write(CredentialPair::new("A1", "R1")).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.read(), Some(CredentialPair::new("A1", "R1")));

        store.write(CredentialPair::new("A2", "R2")).unwrap();
        assert_eq!(store.read(), Some(CredentialPair::new("A2", "R2")));

        store.clear().unwrap();
        assert!(store.read().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_partial_pair_rejected() {
        let store = MemoryTokenStore::with_pair(CredentialPair::new("A1", "R1"));
        assert!(store.write(CredentialPair::new("A2", "")).is_err());
        assert_eq!(store.read(), Some(CredentialPair::new("A1", "R1")));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("session.json");

        let store = FileTokenStore::open(&path);
        assert!(!store.is_authenticated());
        store.write(CredentialPair::new("A1", "R1")).unwrap();

        let reopened = FileTokenStore::open(&path);
        assert_eq!(reopened.read(), Some(CredentialPair::new("A1", "R1")));

        reopened.clear().unwrap();
        assert!(!path.exists());
        assert!(FileTokenStore::open(&path).read().is_none());
    }

    #[test]
    fn test_file_store_ignores_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, r#"{"access_token":"A1"}"#).unwrap();

        let store = FileTokenStore::open(&path);
        assert!(store.read().is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", CredentialPair::new("secret-a", "secret-r"));
        assert!(!rendered.contains("secret"));
    }
}
