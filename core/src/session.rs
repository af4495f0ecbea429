//! Session Id Persistence
//!
//! The generation service issues an opaque session id to group multi-turn
//! interactions. The client keeps exactly one: read once at startup,
//! rewritten whenever the service issues a new one. Loss of the file is
//! harmless (the service starts a fresh session), so reads never fail.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Data directory name under the XDG data dir
const DATA_DIR_NAME: &str = "muse";

/// Session id file name
const SESSION_FILENAME: &str = "session_id";

/// Errors writing the session id file
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file or its parent directory could not be written
    #[error("failed to write session file at {path}: {source}")]
    Write {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: io::Error,
    },
}

/// Durable store for the single session id string
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location under the XDG data dir
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME).join(SESSION_FILENAME))
    }

    /// The backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session id, defaulting to empty
    ///
    /// A missing file is the normal first-run case. Any other read failure
    /// is logged and treated the same way.
    #[must_use]
    pub fn load(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(contents) => contents.trim().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to read session file");
                String::new()
            }
        }
    }

    /// Persist a new session id, creating parent directories as needed
    pub fn save(&self, session_id: &str) -> Result<(), StoreError> {
        let write = || -> io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, session_id)
        };

        write().map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(session_id, "Session id persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session_id"));
        assert_eq!(store.load(), "");
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session_id"));

        store.save("sess-123").unwrap();
        assert_eq!(store.load(), "sess-123");

        // Another store on the same path sees the value (page-reload case)
        let reloaded = SessionStore::new(store.path());
        assert_eq!(reloaded.load(), "sess-123");
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("a").join("b").join("session_id"));

        store.save("sess-9").unwrap();
        assert_eq!(store.load(), "sess-9");
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session_id"));

        store.save("sess-1").unwrap();
        store.save("sess-2").unwrap();
        assert_eq!(store.load(), "sess-2");
    }

    #[test]
    fn test_load_trims_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session_id");
        std::fs::write(&path, "sess-42\n").unwrap();

        let store = SessionStore::new(path);
        assert_eq!(store.load(), "sess-42");
    }
}
