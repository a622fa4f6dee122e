//! The persisted index store.
//!
//! An [`IndexStore`] is a single snapshot file (see
//! [`fingenius_core::snapshot`]) at a fixed path. Its lifecycle is
//! `absent → present(v1) → present(v2) → …`: every write replaces the whole
//! file, and [`IndexStore::merge_and_save`] never drops entries.
//!
//! Writes go to `<path>.tmp` and are renamed over the target, so readers see
//! either the previous or the new snapshot. Read-merge-write is guarded by
//! an exclusive OS advisory lock on `<path>.lock`; a second writer fails with
//! [`Error::Locked`] instead of racing. The OS drops the lock when its owner
//! exits, however it exits, so a lock file left on disk never blocks later
//! runs.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fingenius_core::{snapshot, VectorIndex};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    locking: bool,
}

/// Entry counts before and after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub previous: usize,
    pub added: usize,
    pub total: usize,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locking: true,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.path).with_locking(config.lock)
    }

    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    fn tmp_path(&self) -> PathBuf {
        sibling(&self.path, ".tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and decode the snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if there is no file, [`Error::Persistence`] if it
    /// cannot be read, [`Error::Format`] if it is not a valid snapshot.
    pub fn load(&self) -> Result<VectorIndex> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.clone()))
            }
            Err(e) => return Err(self.persistence("read", e)),
        };

        let index = snapshot::decode(&bytes).map_err(|source| Error::Format {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = index.len(), "loaded store");
        Ok(index)
    }

    /// Like [`load`](Self::load), but an absent store is `None`.
    pub fn load_if_exists(&self) -> Result<Option<VectorIndex>> {
        match self.load() {
            Ok(index) => Ok(Some(index)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the store with `index`, creating parent directories.
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        let bytes = snapshot::encode(index).map_err(|source| Error::Format {
            path: self.path.clone(),
            source,
        })?;

        self.ensure_parent()?;

        let tmp = self.tmp_path();
        fs::write(&tmp, &bytes).map_err(|e| self.persistence("write", e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.persistence("replace", e));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "saved store");
        Ok(())
    }

    /// Take the exclusive writer lock.
    ///
    /// The lock file is created if needed and kept on disk; only the advisory
    /// lock on it matters.
    pub fn lock(&self) -> Result<StoreLock> {
        self.ensure_parent()?;
        let lock = self.lock_path();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock)
            .map_err(|e| self.persistence("lock", e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(Error::Locked {
                    store: self.path.clone(),
                    lock,
                })
            }
            Err(TryLockError::Error(e)) => return Err(self.persistence("lock", e)),
        }

        // The pid is informational only.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        debug!(lock = %lock.display(), "acquired store lock");
        Ok(StoreLock { file, path: lock })
    }

    /// Merge `fresh` with the stored index and write the result.
    ///
    /// `fresh` is the receiver: its entries come first, followed by every
    /// stored entry. Nothing is de-duplicated. On any error the stored file
    /// is left as it was.
    pub fn merge_and_save(&self, fresh: VectorIndex) -> Result<MergeOutcome> {
        let _guard = self.writer_lock()?;
        self.merge_while_locked(fresh)
    }

    /// Take the writer lock if locking is enabled.
    pub fn writer_lock(&self) -> Result<Option<StoreLock>> {
        if self.locking {
            self.lock().map(Some)
        } else {
            Ok(None)
        }
    }

    /// [`merge_and_save`](Self::merge_and_save) for a caller that already
    /// holds the result of [`writer_lock`](Self::writer_lock).
    pub(crate) fn merge_while_locked(&self, fresh: VectorIndex) -> Result<MergeOutcome> {
        let added = fresh.len();
        let mut merged = fresh;
        let previous = match self.load_if_exists()? {
            Some(existing) => {
                let previous = existing.len();
                merged.merge_from(existing)?;
                previous
            }
            None => {
                info!(path = %self.path.display(), "creating new store");
                0
            }
        };

        self.save(&merged)?;
        Ok(MergeOutcome {
            previous,
            added,
            total: merged.len(),
        })
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.persistence("create directory for", e))
            }
            _ => Ok(()),
        }
    }

    fn persistence(&self, action: &'static str, source: io::Error) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            action,
            source,
        }
    }
}

/// Held writer lock, released on drop or when the process exits.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock = %self.path.display(), "released store lock");
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
