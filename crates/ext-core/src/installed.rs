//! Index of packages extracted into the plugins directory.
//!
//! Every extracted package carries its manifest at its root. The index
//! groups manifests by id and keeps the highest version; lower versions of
//! the same id are superseded and may be cleaned up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ext_packages::{MANIFEST_EXTENSION, PackageIdentity, PackageManifest, PackageVersion};
use walkdir::WalkDir;

/// One extracted package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: String,
    pub version: PackageVersion,
    pub directory: PathBuf,
}

impl InstalledPackage {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }
}

/// Authoritative installed version per id.
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    // keyed by lowercase id
    packages: BTreeMap<String, InstalledPackage>,
}

impl InstalledPackages {
    /// Scan `plugins_dir`; a missing directory is an empty index.
    pub async fn scan(plugins_dir: &Path) -> Self {
        let dir = plugins_dir.to_path_buf();
        match tokio::task::spawn_blocking(move || Self::scan_blocking(&dir)).await {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(directory = %plugins_dir.display(), error = %e, "Installed package scan failed");
                Self::default()
            }
        }
    }

    pub fn scan_blocking(plugins_dir: &Path) -> Self {
        let mut packages: BTreeMap<String, InstalledPackage> = BTreeMap::new();
        for package in scan_manifests(plugins_dir) {
            let key = package.id.to_ascii_lowercase();
            match packages.get(&key) {
                Some(existing) if existing.version >= package.version => {}
                _ => {
                    packages.insert(key, package);
                }
            }
        }
        Self { packages }
    }

    pub fn get(&self, id: &str) -> Option<&InstalledPackage> {
        self.packages.get(&id.to_ascii_lowercase())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Installed packages ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPackage> {
        self.packages.values()
    }
}

/// Every readable manifest under `plugins_dir`, in directory order.
///
/// Unreadable manifests are logged and skipped.
pub fn scan_manifests(plugins_dir: &Path) -> Vec<InstalledPackage> {
    if !plugins_dir.exists() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(plugins_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let path = entry.path();
        let is_manifest = entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION));
        if !is_manifest {
            continue;
        }
        let Some(directory) = path.parent() else {
            continue;
        };
        if directory
            .extension()
            .is_some_and(|ext| ext == "partial")
        {
            continue;
        }

        match PackageManifest::from_path(path) {
            Ok(manifest) => found.push(InstalledPackage {
                id: manifest.id,
                version: manifest.version,
                directory: directory.to_path_buf(),
            }),
            Err(e) => {
                tracing::warn!(manifest = %path.display(), error = %e, "Skipping unreadable package manifest");
            }
        }
    }
    found
}

/// Delete the directories of superseded versions.
///
/// Returns how many directories were removed. Failures are logged.
pub async fn cleanup_superseded(plugins_dir: &Path) -> usize {
    let dir = plugins_dir.to_path_buf();
    let all = match tokio::task::spawn_blocking(move || scan_manifests(&dir)).await {
        Ok(all) => all,
        Err(e) => {
            tracing::error!(directory = %plugins_dir.display(), error = %e, "Installed package scan failed");
            return 0;
        }
    };

    let mut latest: BTreeMap<String, &PackageVersion> = BTreeMap::new();
    for package in &all {
        let key = package.id.to_ascii_lowercase();
        let newer = latest.get(&key).is_none_or(|current| package.version > **current);
        if newer {
            latest.insert(key, &package.version);
        }
    }

    let mut removed = 0;
    for package in &all {
        let superseded = latest
            .get(&package.id.to_ascii_lowercase())
            .is_some_and(|top| package.version < **top);
        if superseded {
            tracing::info!(package = %package.id, version = %package.version, "Removing superseded package");
            if ext_fs::io::remove_dir_best_effort(&package.directory).await {
                removed += 1;
            }
        }
    }
    removed
}

/// Directories of every installed version of `id`.
pub async fn directories_of(plugins_dir: &Path, id: &str) -> Vec<PathBuf> {
    let dir = plugins_dir.to_path_buf();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || {
        scan_manifests(&dir)
            .into_iter()
            .filter(|p| p.id.eq_ignore_ascii_case(&id))
            .map(|p| p.directory)
            .collect()
    })
    .await
    .unwrap_or_default()
}
