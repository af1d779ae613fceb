//! Error types for ext-core

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more requested packages could not be materialized from any feed.
    #[error("Unable to download {failed} packages out of {total}.")]
    Incomplete { failed: usize, total: usize },

    #[error("invalid extension settings: {message}")]
    InvalidSettings { message: String },

    #[error("failed to load module {path}: {message}")]
    ModuleLoad { path: PathBuf, message: String },

    #[error("module {path} was built for ABI {abi} / SDK {sdk}, host expects ABI {expected_abi} / SDK {expected_sdk}")]
    IncompatibleModule {
        path: PathBuf,
        abi: u32,
        sdk: String,
        expected_abi: u32,
        expected_sdk: String,
    },

    #[error("schedule lock unavailable")]
    ScheduleLock,

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Fs(#[from] ext_fs::Error),

    #[error(transparent)]
    Packages(#[from] ext_packages::Error),

    #[error(transparent)]
    Acquisition(#[from] ext_packages::AcquisitionError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
