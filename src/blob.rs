//! Blob stores: where uploaded payloads end up.
//!
//! Saves are synchronous and run on the blocking pool, so implementations
//! are free to do plain filesystem IO.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Persists named byte payloads.
///
/// Must be safe to call concurrently for distinct names. Concurrent saves to
/// the same name race; the last writer wins.
pub trait BlobStore: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        (**self).save(name, bytes)
    }
}

/// Writes each blob to `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BlobStore for FsBlobStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "blob written");
        Ok(())
    }
}

/// Names must be a single plain path component.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidBlobName(name.to_string()));
    }
    Ok(())
}

/// In-memory store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    saves: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Total number of save calls that completed, including overwrites.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sleeps before delegating each save. Simulates a slow backend.
#[derive(Debug, Clone)]
pub struct Delayed<S> {
    inner: S,
    delay: Duration,
}

impl<S: BlobStore> Delayed<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<S: BlobStore> BlobStore for Delayed<S> {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        std::thread::sleep(self.delay);
        self.inner.save(name, bytes)
    }
}
