use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// A file whose presence asks a running scheduler to stop.
#[derive(Debug, Clone)]
pub struct StopFile {
    path: PathBuf,
}

impl StopFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the file was present. The file is removed so the
    /// request is observed once.
    pub fn consume(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        info!(path = %self.path.display(), "stop file found");
        if let Err(e) = std::fs::remove_file(&self.path) {
            // Still honour the request; a leftover file only re-raises an already-set flag.
            warn!(path = %self.path.display(), "failed to remove stop file: {e}");
        }
        true
    }

    /// Create the file, asking whichever scheduler watches it to stop.
    pub fn request(&self) -> io::Result<()> {
        std::fs::write(&self.path, "stop")?;
        info!(path = %self.path.display(), "stop requested");
        Ok(())
    }
}
