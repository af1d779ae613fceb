//! On-disk layout of an extension manager instance
//!
//! ```text
//! <plugins>/                 extracted top-level packages + schedule.json
//!   Demo.Plugin.1.0.0/
//!     Demo.Plugin.nuspec
//!     lib/<moniker>/*.so
//! <lib>/                     extracted dependency packages
//! <cache>/                   downloaded package archives
//!   Demo.Plugin.1.0.0.nupkg
//! ```

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// File name of the persisted install/uninstall schedule.
pub const SCHEDULE_FILE_NAME: &str = "schedule.json";

/// Absolute directories used by one extension manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionLayout {
    pub plugins_dir: PathBuf,
    pub dependencies_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl ExtensionLayout {
    /// Build a layout from possibly relative directory names.
    ///
    /// Relative entries are resolved against the current working directory.
    pub fn new(
        plugins_dir: impl AsRef<Path>,
        dependencies_dir: impl AsRef<Path>,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            plugins_dir: absolutize(plugins_dir.as_ref())?,
            dependencies_dir: absolutize(dependencies_dir.as_ref())?,
            cache_dir: absolutize(cache_dir.as_ref())?,
        })
    }

    /// Build a layout with every directory rooted under `base`.
    pub fn under(
        base: &Path,
        plugins_dir: impl AsRef<Path>,
        dependencies_dir: impl AsRef<Path>,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::new(
            base.join(plugins_dir),
            base.join(dependencies_dir),
            base.join(cache_dir),
        )
    }

    /// Location of the schedule document.
    pub fn schedule_path(&self) -> PathBuf {
        self.plugins_dir.join(SCHEDULE_FILE_NAME)
    }

    /// All managed directories, in the order a reset deletes them.
    pub fn all(&self) -> [&Path; 3] {
        [
            self.cache_dir.as_path(),
            self.dependencies_dir.as_path(),
            self.plugins_dir.as_path(),
        ]
    }
}

/// Make `path` absolute without requiring it to exist.
///
/// Existing paths are canonicalized (without the `\\?\` prefix on Windows).
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return dunce::canonicalize(path).map_err(|e| Error::io(path, e));
    }
    std::path::absolute(path).map_err(|e| Error::io(path, e))
}
