//! Local cache of downloaded package archives.
//!
//! Archives live at `<cache>/<id>.<version>.nupkg` next to a `.sha256`
//! sidecar written after a verified download. A cached archive is reused
//! only while it still opens cleanly and matches its sidecar.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ext_fs::checksum::{self, SidecarCheck};

use crate::archive;
use crate::error::{AcquisitionError, FeedError};
use crate::feed::PackageFeed;
use crate::request::PackageIdentity;
use crate::version::VersionRange;

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self, package: &PackageIdentity) -> PathBuf {
        self.dir.join(package.archive_file_name())
    }

    /// Whether a usable archive for `package` is already cached.
    pub async fn is_valid(&self, package: &PackageIdentity) -> bool {
        let path = self.archive_path(package);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return false;
        }
        if let Err(e) = archive::verify(&path).await {
            tracing::warn!(archive = %path.display(), error = %e, "Cached archive failed verification");
            return false;
        }

        match checksum::check_sidecar(&path) {
            Ok(SidecarCheck::Matches | SidecarCheck::Missing) => true,
            Ok(SidecarCheck::Mismatch) => {
                tracing::warn!(archive = %path.display(), "Cached archive does not match its checksum");
                false
            }
            Err(e) => {
                tracing::warn!(archive = %path.display(), error = %e, "Could not checksum cached archive");
                false
            }
        }
    }

    /// Return the cached archive of `package`, downloading it from the first
    /// feed that has it when the cache has no valid copy.
    pub async fn ensure(
        &self,
        feeds: &[Arc<dyn PackageFeed>],
        package: &PackageIdentity,
    ) -> Result<PathBuf, AcquisitionError> {
        let path = self.archive_path(package);
        if self.is_valid(package).await {
            tracing::debug!(package = %package.id, version = %package.version, "Using cached archive");
            return Ok(path);
        }

        ext_fs::io::ensure_dir(&self.dir)
            .await
            .map_err(|e| AcquisitionError::Package {
                id: package.id.clone(),
                source: e.into(),
            })?;

        let mut download = path.clone().into_os_string();
        download.push(".download");
        let download = PathBuf::from(download);

        let mut unauthorized = None;
        for feed in feeds {
            tracing::info!(
                package = %package.id,
                version = %package.version,
                source = %feed.source().uri,
                "Downloading package"
            );
            match feed.download(package, &download).await {
                Ok(()) => return self.commit(package, &download, &path).await,
                Err(FeedError::Unauthorized { source_uri }) if !feed.source().has_credentials() => {
                    tracing::warn!(package = %package.id, source = %source_uri, "Feed requires credentials");
                    unauthorized.get_or_insert(source_uri);
                }
                Err(e) => {
                    tracing::warn!(package = %package.id, source = %feed.source().uri, error = %e, "Download failed");
                }
            }
        }
        let _ = tokio::fs::remove_file(&download).await;

        Err(match unauthorized {
            Some(source_uri) => AcquisitionError::CredentialsRequired {
                id: package.id.clone(),
                source_uri,
            },
            None => AcquisitionError::NotFound {
                id: package.id.clone(),
                range: VersionRange::exact(package.version.clone()).to_string(),
            },
        })
    }

    async fn commit(
        &self,
        package: &PackageIdentity,
        download: &Path,
        path: &Path,
    ) -> Result<PathBuf, AcquisitionError> {
        let corrupt = || AcquisitionError::CorruptArchive {
            id: package.id.clone(),
            version: package.version.to_string(),
            path: path.to_path_buf(),
        };

        if let Err(e) = archive::verify(download).await {
            tracing::error!(archive = %download.display(), error = %e, "Downloaded archive is corrupt");
            let _ = tokio::fs::remove_file(download).await;
            return Err(corrupt());
        }

        tokio::fs::rename(download, path)
            .await
            .map_err(|e| AcquisitionError::Package {
                id: package.id.clone(),
                source: crate::Error::io(path, e),
            })?;

        if let Err(e) = checksum::write_sidecar(path) {
            tracing::warn!(archive = %path.display(), error = %e, "Could not write checksum");
        }

        Ok(path.to_path_buf())
    }
}
