//! Package identifiers as they appear in settings and in the schedule.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::ARCHIVE_EXTENSION;
use crate::error::{Error, Result};
use crate::version::{PackageVersion, VersionRange};

/// `"Id"` or `"Id:Version"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub id: String,
    pub version: Option<String>,
}

impl PackageRequest {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            id: id.into(),
            version: version.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn parse(request: &str) -> Result<Self> {
        let (id, version) = match request.split_once(':') {
            Some((id, version)) => (id.trim(), Some(version.trim().to_string())),
            None => (request.trim(), None),
        };
        if id.is_empty() {
            return Err(Error::InvalidRequest {
                request: request.to_string(),
                reason: "empty package id".to_string(),
            });
        }
        Ok(Self::new(id, version))
    }

    /// The pinned version, if any.
    pub fn pinned(&self) -> Result<Option<PackageVersion>> {
        self.version.as_deref().map(PackageVersion::parse).transpose()
    }

    /// Range accepted by this request: exact when pinned, anything otherwise.
    pub fn range(&self) -> Result<VersionRange> {
        Ok(match self.pinned()? {
            Some(version) => VersionRange::exact(version),
            None => VersionRange::any(),
        })
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl FromStr for PackageRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

/// A concrete package: id plus the version that was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// `<id>.<version>`, the stem shared by archive files and extraction
    /// directories.
    pub fn file_stem(&self) -> String {
        format!("{}.{}", self.id, self.version.original())
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), ARCHIVE_EXTENSION)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
