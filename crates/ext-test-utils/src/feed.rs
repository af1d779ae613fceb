//! Temporary directory fixtures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::package::PackageBuilder;

/// A directory of package archives usable as a local feed.
pub struct TestFeed {
    temp_dir: TempDir,
}

impl Default for TestFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFeed {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// URI to put in a source configuration.
    pub fn uri(&self) -> String {
        self.path().display().to_string()
    }

    /// Write `package` into the feed and return the archive path.
    pub fn publish(&self, package: &PackageBuilder) -> PathBuf {
        package.write_to(self.path())
    }

    pub fn archive_count(&self) -> usize {
        std::fs::read_dir(self.path())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "nupkg"))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Temporary root for the plugins, dependencies and cache directories.
pub struct TestHost {
    temp_dir: TempDir,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root().join("plugins")
    }

    pub fn dependencies_dir(&self) -> PathBuf {
        self.root().join("lib")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("cache")
    }

    /// Assert that `path` (relative to the root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected path to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected path NOT to exist: {}",
            full_path.display()
        );
    }
}
