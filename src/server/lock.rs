//! Advisory lock file.
//!
//! The lock file is the sole local exclusion mechanism against a second
//! server instance, and the marker distinguishing a clean stop from a
//! crash: present while no process runs means the last instance died
//! without cleanup. The file holds the pid of the instance that owns it.

use crate::core::error::WardenResult;
use std::path::{Path, PathBuf};

/// Advisory pid-bearing lock file.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Create a handle for the lock at `path`. Does not touch the
    /// filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `pid` as the owning instance. Overwrites a leftover lock;
    /// callers decide beforehand whether a leftover indicates a crash.
    pub fn acquire(&self, pid: u32) -> WardenResult<()> {
        std::fs::write(&self.path, format!("{pid}\n"))?;
        Ok(())
    }

    /// Remove the lock. Releasing an absent lock is not an error, so stop
    /// paths stay idempotent.
    pub fn release(&self) -> WardenResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the lock file exists.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Pid recorded in the lock file, if present and parseable.
    pub fn holder(&self) -> Option<u32> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        content.trim().parse().ok()
    }
}
