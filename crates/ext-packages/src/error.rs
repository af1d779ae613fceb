use std::path::PathBuf;

/// Errors from parsing and reading packages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    #[error("invalid package request '{request}': {reason}")]
    InvalidRequest { request: String, reason: String },

    #[error("failed to parse package manifest: {reason}")]
    ManifestParse { reason: String },

    #[error("package manifest not found in {0}")]
    ManifestNotFound(PathBuf),

    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(#[from] ext_fs::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a package feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed {source_uri} requires credentials")]
    Unauthorized { source_uri: String },

    #[error("package {id} {version} not found on {source_uri}")]
    PackageNotFound {
        id: String,
        version: String,
        source_uri: String,
    },

    #[error("unsupported feed source '{source_uri}'")]
    UnsupportedSource { source_uri: String },

    #[error("feed {source_uri} failed: {message}")]
    Failed { source_uri: String, message: String },

    #[error(transparent)]
    Package(#[from] Error),
}

impl FeedError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// A package could not be materialized.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("no feed offers a version of {id} matching '{range}'")]
    NotFound { id: String, range: String },

    #[error("archive {path} for {id} {version} is corrupt after download")]
    CorruptArchive {
        id: String,
        version: String,
        path: PathBuf,
    },

    #[error("package {id} requires credentials for {source_uri}")]
    CredentialsRequired { id: String, source_uri: String },

    #[error("gave up on {id} after {attempts} attempts: {last}")]
    RetriesExhausted {
        id: String,
        attempts: u32,
        last: String,
    },

    #[error("failed to materialize {id}: {source}")]
    Package {
        id: String,
        #[source]
        source: Error,
    },
}

impl AcquisitionError {
    /// Id of the package this error is about.
    pub fn package_id(&self) -> &str {
        match self {
            Self::NotFound { id, .. }
            | Self::CorruptArchive { id, .. }
            | Self::CredentialsRequired { id, .. }
            | Self::RetriesExhausted { id, .. }
            | Self::Package { id, .. } => id,
        }
    }
}
