//! Recursive materialization of packages and their dependencies.
//!
//! Materializing a package means: pick a version, make sure its archive is
//! in the [`ArtifactCache`], materialize the dependencies declared for the
//! current platform into the shared dependencies directory, then extract the
//! archive into the destination directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::archive;
use crate::cache::ArtifactCache;
use crate::error::{AcquisitionError, FeedError};
use crate::feed::PackageFeed;
use crate::request::{PackageIdentity, PackageRequest};
use crate::targets::TargetMonikers;
use crate::version::{PackageVersion, VersionRange};

/// Why a package is being materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeRole {
    /// Requested by the host; a failure is reported after one attempt.
    TopLevel,
    /// Pulled in by another package; retried with backoff.
    Dependency,
}

/// Bounded retry for dependency acquisition.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }
}

/// A package on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub identity: PackageIdentity,
    pub directory: PathBuf,
}

/// Lowercase module name with `.` and `-` folded to `_`, the form shared by
/// package ids and loaded module names.
pub fn normalize_module_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

type LoadedCheck<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

pub struct DependencyResolver {
    feeds: Vec<Arc<dyn PackageFeed>>,
    cache: ArtifactCache,
    dependencies_dir: PathBuf,
    targets: TargetMonikers,
    retry: RetryPolicy,
}

impl DependencyResolver {
    pub fn new(
        feeds: Vec<Arc<dyn PackageFeed>>,
        cache: ArtifactCache,
        dependencies_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            feeds,
            cache,
            dependencies_dir: dependencies_dir.into(),
            targets: TargetMonikers::current(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_targets(mut self, targets: TargetMonikers) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn feeds(&self) -> &[Arc<dyn PackageFeed>] {
        &self.feeds
    }

    pub fn targets(&self) -> &TargetMonikers {
        &self.targets
    }

    /// The pinned version of `request`, or the latest version `feed` offers.
    pub async fn resolve_version(
        feed: &dyn PackageFeed,
        request: &PackageRequest,
    ) -> Result<Option<PackageVersion>, FeedError> {
        if let Some(pinned) = request.pinned()? {
            return Ok(Some(pinned));
        }
        Ok(feed.list_versions(&request.id).await?.into_iter().max())
    }

    /// Materialize `request` into `destination` using every configured feed.
    ///
    /// `loaded` receives normalized module names; dependencies it reports as
    /// already loaded are not acquired again.
    pub async fn ensure_materialized(
        &self,
        request: &PackageRequest,
        destination: &Path,
        role: MaterializeRole,
        loaded: LoadedCheck<'_>,
    ) -> Result<Materialized, AcquisitionError> {
        self.ensure_from(&self.feeds, request, destination, role, loaded)
            .await
    }

    /// Like [`ensure_materialized`](Self::ensure_materialized), but the
    /// requested package itself is only looked up in `feeds`. Dependencies
    /// still come from every configured feed.
    pub async fn ensure_from(
        &self,
        feeds: &[Arc<dyn PackageFeed>],
        request: &PackageRequest,
        destination: &Path,
        role: MaterializeRole,
        loaded: LoadedCheck<'_>,
    ) -> Result<Materialized, AcquisitionError> {
        let range = request.range().map_err(|e| AcquisitionError::Package {
            id: request.id.clone(),
            source: e,
        })?;
        let mut visited = HashSet::from([normalize_module_name(&request.id)]);
        self.attempt(feeds, &request.id, &range, destination, role, loaded, &mut visited)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        feeds: &[Arc<dyn PackageFeed>],
        id: &str,
        range: &VersionRange,
        destination: &Path,
        role: MaterializeRole,
        loaded: LoadedCheck<'_>,
        visited: &mut HashSet<String>,
    ) -> Result<Materialized, AcquisitionError> {
        if role == MaterializeRole::TopLevel {
            return self
                .materialize(feeds, id, range, destination, loaded, visited)
                .await;
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_interval(self.retry.max_interval)
            .with_max_elapsed_time(None)
            .build();
        let max_attempts = self.retry.max_attempts.max(1);

        // A failed attempt must not leave its dependencies marked as visited.
        let snapshot = visited.clone();
        let mut attempt = 1;
        loop {
            match self
                .materialize(feeds, id, range, destination, loaded, visited)
                .await
            {
                Ok(materialized) => return Ok(materialized),
                Err(e @ AcquisitionError::CredentialsRequired { .. }) => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(AcquisitionError::RetriesExhausted {
                        id: id.to_string(),
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = backoff.next_backoff().unwrap_or(self.retry.max_interval);
                    tracing::warn!(
                        package = %id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying dependency"
                    );
                    tokio::time::sleep(delay).await;
                    visited.clone_from(&snapshot);
                    attempt += 1;
                }
            }
        }
    }

    fn materialize<'a>(
        &'a self,
        feeds: &'a [Arc<dyn PackageFeed>],
        id: &'a str,
        range: &'a VersionRange,
        destination: &'a Path,
        loaded: LoadedCheck<'a>,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<Materialized, AcquisitionError>> {
        async move {
            let version = self.select_version(feeds, id, range).await?;
            let identity = PackageIdentity::new(id, version);
            let package_error = |source: crate::Error| AcquisitionError::Package {
                id: id.to_string(),
                source,
            };

            let archive_path = self.cache.ensure(feeds, &identity).await?;
            let manifest = archive::read_manifest(&archive_path)
                .await
                .map_err(package_error)?;

            if let Some(group) = self.targets.select_group(&manifest.dependency_groups) {
                for dependency in &group.dependencies {
                    let name = normalize_module_name(&dependency.id);
                    if loaded(&name) {
                        tracing::warn!(
                            package = %identity.id,
                            dependency = %dependency.id,
                            "Dependency already loaded, skipping"
                        );
                        continue;
                    }
                    if !visited.insert(name) {
                        tracing::debug!(dependency = %dependency.id, "Dependency already visited");
                        continue;
                    }

                    let dependencies_dir = self.dependencies_dir.clone();
                    self.attempt(
                        &self.feeds,
                        &dependency.id,
                        &dependency.range,
                        &dependencies_dir,
                        MaterializeRole::Dependency,
                        loaded,
                        visited,
                    )
                    .await?;
                }
            }

            ext_fs::io::ensure_dir(destination)
                .await
                .map_err(|e| package_error(e.into()))?;
            let directory = archive::extract_to_directory(&archive_path, destination)
                .await
                .map_err(package_error)?;

            Ok(Materialized {
                identity,
                directory,
            })
        }
        .boxed()
    }

    /// Pinned versions are used as is. Otherwise the first feed offering a
    /// version in `range` decides; feeds are never merged.
    async fn select_version(
        &self,
        feeds: &[Arc<dyn PackageFeed>],
        id: &str,
        range: &VersionRange,
    ) -> Result<PackageVersion, AcquisitionError> {
        if let Some(pinned) = range.as_exact() {
            return Ok(pinned.clone());
        }

        let mut unauthorized = None;
        for feed in feeds {
            match feed.list_versions(id).await {
                Ok(versions) => {
                    if let Some(best) = range.find_best_match(&versions) {
                        tracing::debug!(package = %id, version = %best, source = %feed.source().uri, "Selected version");
                        return Ok(best.clone());
                    }
                }
                Err(FeedError::Unauthorized { source_uri }) if !feed.source().has_credentials() => {
                    unauthorized.get_or_insert(source_uri);
                }
                Err(e) => {
                    tracing::warn!(package = %id, source = %feed.source().uri, error = %e, "Feed lookup failed");
                }
            }
        }

        Err(match unauthorized {
            Some(source_uri) => AcquisitionError::CredentialsRequired {
                id: id.to_string(),
                source_uri,
            },
            None => AcquisitionError::NotFound {
                id: id.to_string(),
                range: range.to_string(),
            },
        })
    }
}
