//! PID file bookkeeping.
//!
//! The file is written once at least one listener is up and removed when the
//! [`PidFile`] guard is dropped, which happens on every orderly exit path of
//! `main`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Error type for PID file operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("I/O error writing PID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Holds the PID file for as long as the process runs.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`PidFileError::Io`] if the file cannot be written.
    pub fn create(path: &Path) -> Result<Self, PidFileError> {
        Self::write(path, std::process::id())
    }

    fn write(path: &Path, pid: u32) -> Result<Self, PidFileError> {
        std::fs::write(path, format!("{pid}\n")).map_err(|source| PidFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Wrote PID {pid} to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove PID file {}: {e}", self.path.display());
        }
    }
}
