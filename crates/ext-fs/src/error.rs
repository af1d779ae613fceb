//! Error types for ext-fs

use std::path::PathBuf;

use crate::config::ConfigFormat;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} in {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: ConfigFormat,
        message: String,
    },

    #[error("cannot write {path} as {format}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: ConfigFormat,
        message: String,
    },

    #[error("{path} is not a .json, .toml or .yaml file")]
    UnsupportedFormat { path: PathBuf },

    #[error("could not lock {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
