//! Package feeds.
//!
//! A feed lists versions, downloads archives and answers search queries.
//! Remote protocol clients live in the host; this crate ships the
//! [`LocalFeed`] over a directory of archives and the [`FeedProvider`] seam
//! that turns configured sources into feeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::ARCHIVE_EXTENSION;
use crate::archive;
use crate::error::FeedError;
use crate::request::PackageIdentity;
use crate::version::PackageVersion;

/// One configured feed.
///
/// Deserializes from either a bare URI string or an object with `Uri`,
/// `Username`, `Password` and `Searchable` (default `true`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SourceRepr", rename_all = "PascalCase")]
pub struct ExtensionSource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub searchable: bool,
}

impl ExtensionSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
            searchable: true,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn is_remote(&self) -> bool {
        let uri = self.uri.to_ascii_lowercase();
        uri.starts_with("http://") || uri.starts_with("https://")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceRepr {
    Uri(String),
    Full {
        #[serde(rename = "Uri", alias = "uri")]
        uri: String,
        #[serde(rename = "Username", alias = "username", default)]
        username: Option<String>,
        #[serde(rename = "Password", alias = "password", default)]
        password: Option<String>,
        #[serde(rename = "Searchable", alias = "searchable", default = "default_searchable")]
        searchable: bool,
    },
}

fn default_searchable() -> bool {
    true
}

impl From<SourceRepr> for ExtensionSource {
    fn from(repr: SourceRepr) -> Self {
        match repr {
            SourceRepr::Uri(uri) => Self::new(uri),
            SourceRepr::Full {
                uri,
                username,
                password,
                searchable,
            } => Self {
                uri,
                username,
                password,
                searchable,
            },
        }
    }
}

/// A package id found by a search, with the versions the feed offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub versions: Vec<PackageVersion>,
}

/// Capability of one package source.
#[async_trait]
pub trait PackageFeed: Send + Sync {
    fn source(&self) -> &ExtensionSource;

    /// Every version of `id` the feed offers, ascending.
    async fn list_versions(&self, id: &str) -> Result<Vec<PackageVersion>, FeedError>;

    /// Download the archive of `package` to `destination`.
    async fn download(&self, package: &PackageIdentity, destination: &Path) -> Result<(), FeedError>;

    /// Page through packages whose id contains `query`.
    async fn search(&self, query: &str, skip: usize, take: usize) -> Result<Vec<SearchHit>, FeedError>;
}

/// Builds a feed for a configured source.
pub trait FeedProvider: Send + Sync {
    fn create(&self, source: &ExtensionSource) -> Result<Arc<dyn PackageFeed>, FeedError>;
}

/// Provides [`LocalFeed`]s for filesystem paths and `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFeedProvider;

impl FeedProvider for LocalFeedProvider {
    fn create(&self, source: &ExtensionSource) -> Result<Arc<dyn PackageFeed>, FeedError> {
        if source.is_remote() {
            return Err(FeedError::UnsupportedSource {
                source_uri: source.uri.clone(),
            });
        }
        Ok(Arc::new(LocalFeed::new(source.clone())?))
    }
}

/// A directory tree of package archives.
#[derive(Debug, Clone)]
pub struct LocalFeed {
    source: ExtensionSource,
    root: PathBuf,
}

impl LocalFeed {
    pub fn new(source: ExtensionSource) -> Result<Self, FeedError> {
        let root = local_path(&source.uri);
        let root = std::path::absolute(&root).map_err(|e| FeedError::Failed {
            source_uri: source.uri.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { source, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every readable archive under the root with its identity.
    ///
    /// Rebuilt on each call so archives dropped into the directory are seen
    /// immediately.
    async fn index(&self) -> Result<Vec<(PackageIdentity, PathBuf)>, FeedError> {
        let root = self.root.clone();
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(FeedError::Failed {
                source_uri: self.source.uri.clone(),
                message: format!("directory {} does not exist", root.display()),
            });
        }

        let entries = tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry.file_type().is_file()
                        && entry
                            .path()
                            .extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
                })
                .filter_map(|entry| match archive::read_manifest_blocking(entry.path()) {
                    Ok(manifest) => Some((manifest.identity(), entry.into_path())),
                    Err(e) => {
                        tracing::warn!(archive = %entry.path().display(), error = %e, "Skipping unreadable archive");
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| FeedError::Failed {
            source_uri: self.source.uri.clone(),
            message: e.to_string(),
        })?;

        Ok(entries)
    }
}

#[async_trait]
impl PackageFeed for LocalFeed {
    fn source(&self) -> &ExtensionSource {
        &self.source
    }

    async fn list_versions(&self, id: &str) -> Result<Vec<PackageVersion>, FeedError> {
        let mut versions: Vec<PackageVersion> = self
            .index()
            .await?
            .into_iter()
            .filter(|(identity, _)| identity.id.eq_ignore_ascii_case(id))
            .map(|(identity, _)| identity.version)
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    async fn download(&self, package: &PackageIdentity, destination: &Path) -> Result<(), FeedError> {
        let source = self
            .index()
            .await?
            .into_iter()
            .find(|(identity, _)| {
                identity.id.eq_ignore_ascii_case(&package.id) && identity.version == package.version
            })
            .map(|(_, path)| path)
            .ok_or_else(|| FeedError::PackageNotFound {
                id: package.id.clone(),
                version: package.version.to_string(),
                source_uri: self.source.uri.clone(),
            })?;

        tokio::fs::copy(&source, destination)
            .await
            .map_err(|e| FeedError::Failed {
                source_uri: self.source.uri.clone(),
                message: format!("copying {}: {e}", source.display()),
            })?;
        Ok(())
    }

    async fn search(&self, query: &str, skip: usize, take: usize) -> Result<Vec<SearchHit>, FeedError> {
        let query = query.to_ascii_lowercase();
        let mut hits: Vec<SearchHit> = Vec::new();
        for (identity, _) in self.index().await? {
            if !identity.id.to_ascii_lowercase().contains(&query) {
                continue;
            }
            match hits.iter_mut().find(|hit| hit.id.eq_ignore_ascii_case(&identity.id)) {
                Some(hit) => hit.versions.push(identity.version),
                None => hits.push(SearchHit {
                    id: identity.id,
                    versions: vec![identity.version],
                }),
            }
        }

        hits.sort_by_key(|hit| hit.id.to_ascii_lowercase());
        for hit in &mut hits {
            hit.versions.sort();
            hit.versions.dedup();
        }
        Ok(hits.into_iter().skip(skip).take(take).collect())
    }
}

fn local_path(uri: &str) -> PathBuf {
    match uri.strip_prefix("file://") {
        // file:///C:/feed on Windows
        Some(rest) if cfg!(windows) && rest.starts_with('/') && rest.get(2..3) == Some(":") => {
            PathBuf::from(&rest[1..])
        }
        Some(rest) => PathBuf::from(rest),
        None => PathBuf::from(uri),
    }
}
