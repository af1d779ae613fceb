//! Package domain of the extension manager.
//!
//! Versions and ranges, package manifests, target-platform selection, the
//! feed capability, the local artifact cache and the recursive dependency
//! resolver that materializes packages on disk.

pub mod archive;
pub mod cache;
pub mod error;
pub mod feed;
pub mod manifest;
pub mod request;
pub mod resolver;
pub mod targets;
pub mod version;

/// File extension of package archives.
pub const ARCHIVE_EXTENSION: &str = "nupkg";

/// File extension of package manifests.
pub const MANIFEST_EXTENSION: &str = "nuspec";

pub use cache::ArtifactCache;
pub use error::{AcquisitionError, Error, FeedError, Result};
pub use feed::{
    ExtensionSource, FeedProvider, LocalFeed, LocalFeedProvider, PackageFeed, SearchHit,
};
pub use manifest::{DependencyGroup, PackageDependency, PackageManifest};
pub use request::{PackageIdentity, PackageRequest};
pub use resolver::{DependencyResolver, MaterializeRole, RetryPolicy, normalize_module_name};
pub use targets::TargetMonikers;
pub use version::{PackageVersion, VersionRange};
