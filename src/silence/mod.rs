//! Scoped notification-suppression signal for the run.
//!
//! The runner issues its own desktop notifications, so each spawned agent is
//! told to keep quiet: an env var on the child plus a marker file that other
//! tooling can probe for the duration of the run. The marker is a scoped
//! acquisition: created when the run starts, removed on every exit path via
//! `Drop`. It is never ambient global state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Env var set on every spawned agent to suppress its own notifications.
pub const NOTIFY_SILENT_ENV: &str = "RALPH_NOTIFY_SILENT";

/// Marker file name advertising an in-flight run.
pub const MARKER_FILE: &str = ".ralphr-silent";

/// RAII guard owning the marker file for the life of the run.
#[derive(Debug)]
pub struct SilenceGuard {
    path: PathBuf,
}

impl SilenceGuard {
    /// Create the marker file in `dir`.
    pub fn acquire(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(MARKER_FILE);
        fs::write(&path, format!("{}\n", std::process::id()))?;
        log::debug!("Created silence marker at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SilenceGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!(
                "Failed to remove silence marker {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
