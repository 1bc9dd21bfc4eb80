//! File identity derivation.
//!
//! An identity is the tuple (absolute path, size, modification time) captured
//! from a fresh stat. Decision points recompute it rather than trusting a
//! stale copy, so an in-flight write produces a different identity than the
//! finished file.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of a file's observable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    /// Absolutized path of the file.
    pub path: PathBuf,
    /// Size in bytes at capture time.
    pub size: u64,
    /// Modification timestamp at capture time.
    pub modified: SystemTime,
}

impl FileIdentity {
    /// Stat `path` and capture its identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the path cannot be absolutized or stat'd, or
    /// when it does not name a regular file.
    pub async fn capture(path: &Path) -> io::Result<Self> {
        let path = std::path::absolute(path)?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        let modified = metadata.modified()?;
        Ok(Self {
            path,
            size: metadata.len(),
            modified,
        })
    }

    /// Final path component rendered for log lines and notifications.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |name| {
                name.to_string_lossy().into_owned()
            })
    }
}
