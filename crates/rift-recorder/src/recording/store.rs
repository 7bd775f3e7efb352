//! Storage for recorded artifacts.
//!
//! Artifacts are flat `name -> bytes` entries. Stub files and body files live
//! in separate stores (`mappings/` and `__files/` on disk).

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Prefix of in-flight files in a [`FileArtifactStore`] root.
const TEMP_PREFIX: &str = ".rift-partial-";

/// Errors from an artifact store. Nothing is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("I/O error on artifact '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of [`ArtifactStore::write_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The name was taken; existing content was left alone
    AlreadyExists,
}

/// Flat key-value store for artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `name`, replacing any existing entry.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Write `bytes` under `name` only if nothing is stored there yet.
    ///
    /// The check and the write happen atomically.
    fn write_if_absent(&self, name: &str, bytes: &[u8]) -> Result<WriteOutcome, StoreError>;

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// All stored names, sorted.
    fn names(&self) -> Result<Vec<String>, StoreError>;
}

/// Names must be plain file names.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0'])
        || name.starts_with(TEMP_PREFIX);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// Directory-backed store
// ============================================================================

/// One file per artifact under a root directory.
///
/// The directory is created on first write. Content is written to a temp file
/// in the same directory and renamed into place, so an artifact is either
/// complete or absent.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn ensure_root(&self, name: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            name: name.to_string(),
            source,
        })
    }

    /// Temp file under the root holding `bytes`; removed again when dropped.
    fn stage(&self, name: &str, bytes: &[u8]) -> Result<NamedTempFile, StoreError> {
        self.ensure_root(name)?;
        let io_err = |source| StoreError::Io {
            name: name.to_string(),
            source,
        };
        let mut staged = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)
            .map_err(io_err)?;
        staged.write_all(bytes).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;
        Ok(staged)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let staged = self.stage(name, bytes)?;
        staged.persist(&path).map_err(|e| StoreError::Io {
            name: name.to_string(),
            source: e.error,
        })?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }

    fn write_if_absent(&self, name: &str, bytes: &[u8]) -> Result<WriteOutcome, StoreError> {
        let path = self.path_for(name)?;
        if path.exists() {
            debug!("{:?} already exists, leaving it untouched", path);
            return Ok(WriteOutcome::AlreadyExists);
        }

        let staged = self.stage(name, bytes)?;
        match staged.persist_noclobber(&path) {
            Ok(_) => {
                debug!("Wrote {} bytes to {:?}", bytes.len(), path);
                Ok(WriteOutcome::Written)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("{:?} already exists, leaving it untouched", path);
                Ok(WriteOutcome::AlreadyExists)
            }
            Err(e) => Err(StoreError::Io {
                name: name.to_string(),
                source: e.error,
            }),
        }
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(name)?.is_file())
    }

    fn names(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source| StoreError::Io {
            name: self.root.display().to_string(),
            source,
        };
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().map_err(io_err)?.is_file() && !name.starts_with(TEMP_PREFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store backed by a map; used by tests and embedders.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_name(name)?;
        self.entries.write().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn write_if_absent(&self, name: &str, bytes: &[u8]) -> Result<WriteOutcome, StoreError> {
        validate_name(name)?;
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Ok(WriteOutcome::AlreadyExists);
        }
        entries.insert(name.to_string(), bytes.to_vec());
        Ok(WriteOutcome::Written)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_name(name)?;
        Ok(self.entries.read().get(name).cloned())
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        validate_name(name)?;
        Ok(self.entries.read().contains_key(name))
    }

    fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
