//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, Result};

/// Retry settings for the final rename of an atomic write.
///
/// On Windows a rename can transiently fail while another process (an
/// indexer, an antivirus scanner) holds the target open.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// Give up retrying after this long.
    pub max_elapsed: Duration,
    /// Delay before the first retry.
    pub initial_interval: Duration,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            max_elapsed: Duration::from_secs(2),
            initial_interval: Duration::from_millis(20),
        }
    }
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8], robustness: RobustnessConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Same directory as the target so the rename never crosses filesystems
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;
    drop(temp_file);

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(robustness.initial_interval)
        .with_max_elapsed_time(Some(robustness.max_elapsed))
        .build();

    backoff::retry(policy, || {
        fs::rename(&temp_path, path).map_err(backoff::Error::transient)
    })
    .map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        let source = match e {
            backoff::Error::Permanent(err) => err,
            backoff::Error::Transient { err, .. } => err,
        };
        Error::io(path, source)
    })
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Recursively delete a directory, logging instead of failing.
///
/// Returns `true` when the directory is gone afterwards (including when it
/// never existed).
pub async fn remove_dir_best_effort(path: &Path) -> bool {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return true;
    }

    tracing::info!(directory = %path.display(), "Deleting directory");
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            tracing::info!(directory = %path.display(), "Deleted directory");
            true
        }
        Err(e) => {
            tracing::error!(directory = %path.display(), error = %e, "Error deleting directory");
            false
        }
    }
}

/// Create a directory (and parents) if it does not exist yet.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }

    tracing::info!(directory = %path.display(), "Creating directory");
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    tracing::info!(directory = %path.display(), "Created directory");
    Ok(())
}
