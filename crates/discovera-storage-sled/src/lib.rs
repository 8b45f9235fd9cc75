//! Sled-backed key-value text store for Discovera.
//!
//! The durable analog of browser local storage: opaque UTF-8 text under string
//! keys. Storage keys are written as `entry/{key}` so unrelated trees could
//! share the database file later.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use discovera_engine::{DiscoveraError, Result, StorageBackend};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SledBackendConfig {
    pub path: PathBuf,
    pub flush_on_write: bool,
}

impl SledBackendConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_on_write: true,
        }
    }
}

#[derive(Debug, Error)]
enum BackendError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("utf8 error: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl From<BackendError> for DiscoveraError {
    fn from(err: BackendError) -> Self {
        DiscoveraError::Storage(err.to_string())
    }
}

/// Sled-backed implementation of [`StorageBackend`]. Cheap to clone; clones
/// share the underlying database handle.
#[derive(Clone)]
pub struct SledBackend {
    db: sled::Db,
    flush_on_write: bool,
}

impl SledBackend {
    pub fn open(config: SledBackendConfig) -> Result<Self> {
        let db = sled::open(&config.path).map_err(BackendError::from)?;
        Ok(Self {
            db,
            flush_on_write: config.flush_on_write,
        })
    }

    fn entry_key(key: &str) -> Vec<u8> {
        format!("entry/{key}").into_bytes()
    }

    fn flush_if_needed(&self) -> Result<()> {
        if self.flush_on_write {
            self.db.flush().map_err(BackendError::from)?;
        }
        Ok(())
    }
}

impl StorageBackend for SledBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let bytes = match self.db.get(Self::entry_key(key)).map_err(BackendError::from)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let text = String::from_utf8(bytes.to_vec()).map_err(BackendError::from)?;
        Ok(Some(text))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(Self::entry_key(key), value.as_bytes())
            .map_err(BackendError::from)?;
        self.flush_if_needed()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(Self::entry_key(key))
            .map_err(BackendError::from)?;
        self.flush_if_needed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_backend() -> (SledBackend, TempDir) {
        let tmp = TempDir::new().expect("tempdir");
        let backend = SledBackend::open(SledBackendConfig::new(tmp.path())).expect("open");
        (backend, tmp)
    }

    #[test]
    fn save_then_load_round_trips_text() {
        let (backend, _tmp) = new_backend();
        backend.save("discovera_books", r#"[{"id":0}]"#).unwrap();
        let loaded = backend.load("discovera_books").unwrap();
        assert_eq!(loaded.as_deref(), Some(r#"[{"id":0}]"#));
    }

    #[test]
    fn missing_key_reports_absent() {
        let (backend, _tmp) = new_backend();
        assert!(backend.load("discovera_books").unwrap().is_none());
    }

    #[test]
    fn overwrite_replaces_previous_value() {
        let (backend, _tmp) = new_backend();
        backend.save("k", "first").unwrap();
        backend.save("k", "second").unwrap();
        assert_eq!(backend.load("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn remove_clears_entry() {
        let (backend, _tmp) = new_backend();
        backend.save("discovera_auth", "{}").unwrap();
        backend.remove("discovera_auth").unwrap();
        assert!(backend.load("discovera_auth").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let backend = SledBackend::open(SledBackendConfig::new(tmp.path())).unwrap();
            backend.save("discovera_books", "persisted").unwrap();
        }
        let backend = SledBackend::open(SledBackendConfig::new(tmp.path())).unwrap();
        assert_eq!(
            backend.load("discovera_books").unwrap().as_deref(),
            Some("persisted")
        );
    }
}
