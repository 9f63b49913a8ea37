//! Plaintext API key storage next to the working directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_KEY_FILE: &str = ".api_key";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("API key is empty")]
    Empty,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    path: PathBuf,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FILE)
    }
}

impl ApiKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored key, or `None` when no usable key is on disk.
    pub fn load(&self) -> Result<Option<String>, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(normalize_api_key(Some(content))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, key: &str) -> Result<(), CredentialError> {
        let key = normalize_api_key(Some(key.to_string())).ok_or(CredentialError::Empty)?;
        fs::write(&self.path, key).map_err(|source| CredentialError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn normalize_api_key(key: Option<String>) -> Option<String> {
    key.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::new(dir.path().join(".api_key"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_trims_and_load_returns_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::new(dir.path().join(".api_key"));

        store.save("  sk-test-123\n").unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "sk-test-123");
        assert_eq!(store.load().unwrap().as_deref(), Some("sk-test-123"));
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::new(dir.path().join(".api_key"));

        assert!(matches!(store.save("   "), Err(CredentialError::Empty)));
        assert!(!store.path().exists());
    }

    #[test]
    fn whitespace_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::new(dir.path().join(".api_key"));
        fs::write(store.path(), "\n  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
