//! Package versions and version ranges.
//!
//! Versions have one to four numeric components and an optional prerelease
//! label (`1.2`, `1.2.3.4`, `2.0.0-beta.1`). Ordering is semantic everywhere:
//! components compare numerically, then a release outranks any prerelease.
//!
//! Ranges use the bracket syntax of package feeds:
//!
//! ```
//! use ext_packages::version::{PackageVersion, VersionRange};
//!
//! let range: VersionRange = "[1.0,2.0)".parse().unwrap();
//! assert!(range.satisfies(&"1.5.0".parse().unwrap()));
//! assert!(!range.satisfies(&"2.0".parse().unwrap()));
//!
//! // A bare version is a minimum.
//! let range: VersionRange = "1.2".parse().unwrap();
//! let candidates: Vec<PackageVersion> =
//!     ["1.0", "1.2.1", "1.3"].iter().map(|v| v.parse().unwrap()).collect();
//! assert_eq!(range.find_best_match(&candidates).unwrap().to_string(), "1.2.1");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A package version as published by a feed.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    prerelease: semver::Prerelease,
    original: String,
}

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: semver::Prerelease::EMPTY,
            original: format!("{major}.{minor}.{patch}"),
        }
    }

    pub fn parse(version: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidVersion {
            version: version.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty version"));
        }

        // Build metadata never participates in ordering.
        let without_metadata = trimmed.split('+').next().unwrap_or(trimmed);
        let (numbers, label) = match without_metadata.split_once('-') {
            Some((numbers, label)) => (numbers, Some(label)),
            None => (without_metadata, None),
        };

        let parts = numbers
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| invalid(&format!("'{part}' is not a number")))
            })
            .collect::<Result<Vec<_>>>()?;
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid("expected one to four numeric components"));
        }

        let prerelease = match label {
            Some("") => return Err(invalid("empty prerelease label")),
            Some(label) => semver::Prerelease::new(label).map_err(|e| invalid(&e.to_string()))?,
            None => semver::Prerelease::EMPTY,
        };

        let component = |i: usize| parts.get(i).copied().unwrap_or(0);
        Ok(Self {
            major: component(0),
            minor: component(1),
            patch: component(2),
            revision: component(3),
            prerelease,
            original: trimmed.to_string(),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// The version exactly as the feed spelled it; used in file names.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Canonical three- or four-part spelling.
    pub fn normalized(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision > 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if self.is_prerelease() {
            out.push('-');
            out.push_str(self.prerelease.as_str());
        }
        out
    }
}

impl FromStr for PackageVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| self.prerelease.cmp(&other.prerelease))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, self.revision).hash(state);
        self.prerelease.hash(state);
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An interval of acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: Option<PackageVersion>,
    min_inclusive: bool,
    max: Option<PackageVersion>,
    max_inclusive: bool,
    raw: String,
}

impl VersionRange {
    /// Accepts every version.
    pub fn any() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            raw: "*".to_string(),
        }
    }

    /// Accepts exactly `version`.
    pub fn exact(version: PackageVersion) -> Self {
        let raw = format!("[{version}]");
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
            raw,
        }
    }

    pub fn parse(range: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRange {
            range: range.to_string(),
            reason: reason.to_string(),
        };
        let version = |s: &str| -> Result<Option<PackageVersion>> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                PackageVersion::parse(s)
                    .map(Some)
                    .map_err(|e| invalid(&e.to_string()))
            }
        };

        let trimmed = range.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self {
                raw: trimmed.to_string(),
                ..Self::any()
            });
        }

        let first = trimmed.chars().next().unwrap_or_default();
        let last = trimmed.chars().last().unwrap_or_default();
        if first != '[' && first != '(' {
            // A bare version is an inclusive minimum.
            return Ok(Self {
                min: version(trimmed)?,
                min_inclusive: true,
                max: None,
                max_inclusive: false,
                raw: trimmed.to_string(),
            });
        }
        if last != ']' && last != ')' {
            return Err(invalid("missing closing bracket"));
        }

        let min_inclusive = first == '[';
        let max_inclusive = last == ']';
        let inner = &trimmed[1..trimmed.len() - 1];

        let Some((low, high)) = inner.split_once(',') else {
            if !(min_inclusive && max_inclusive) {
                return Err(invalid("a single version must use inclusive brackets"));
            }
            let exact = version(inner)?.ok_or_else(|| invalid("empty brackets"))?;
            return Ok(Self {
                raw: trimmed.to_string(),
                ..Self::exact(exact)
            });
        };
        if high.contains(',') {
            return Err(invalid("too many commas"));
        }

        let min = version(low)?;
        let max = version(high)?;
        if let (Some(min), Some(max)) = (&min, &max) {
            let empty = match min.cmp(max) {
                Ordering::Greater => true,
                Ordering::Equal => !(min_inclusive && max_inclusive),
                Ordering::Less => false,
            };
            if empty {
                return Err(invalid("range excludes every version"));
            }
        }

        Ok(Self {
            min_inclusive: min.is_some() && min_inclusive,
            max_inclusive: max.is_some() && max_inclusive,
            min,
            max,
            raw: trimmed.to_string(),
        })
    }

    pub fn min(&self) -> Option<&PackageVersion> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&PackageVersion> {
        self.max.as_ref()
    }

    /// The single version this range accepts, if it is a pin.
    pub fn as_exact(&self) -> Option<&PackageVersion> {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) if self.min_inclusive && self.max_inclusive && min == max => {
                Some(min)
            }
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn satisfies(&self, version: &PackageVersion) -> bool {
        let above = match &self.min {
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
            None => true,
        };
        let below = match &self.max {
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
            None => true,
        };
        above && below
    }

    /// Best candidate for this range.
    ///
    /// With a lower bound, the lowest satisfying version wins; an open lower
    /// bound picks the highest satisfying version.
    pub fn find_best_match<'a>(&self, candidates: &'a [PackageVersion]) -> Option<&'a PackageVersion> {
        let satisfying = candidates.iter().filter(|v| self.satisfies(v));
        if self.min.is_some() {
            satisfying.min()
        } else {
            satisfying.max()
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}
