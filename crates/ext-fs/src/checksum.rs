//! SHA-256 sidecar files.
//!
//! A sidecar `<file>.sha256` records the digest of a file at the time it
//! was known to be good, so later readers can detect that it changed.

use std::fs::File;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::{Error, Result, io};

const PREFIX: &str = "sha256:";

pub const SIDECAR_EXTENSION: &str = "sha256";

/// Outcome of comparing a file with its sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarCheck {
    Missing,
    Matches,
    Mismatch,
}

/// `sha256:<hex>` digest of `content`.
pub fn digest_bytes(content: &[u8]) -> String {
    format!("{PREFIX}{:x}", Sha256::digest(content))
}

/// Digest of a file, streamed.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(format!("{PREFIX}{:x}", hasher.finalize()))
}

pub fn is_digest(value: &str) -> bool {
    value
        .strip_prefix(PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".");
    sidecar.push(SIDECAR_EXTENSION);
    PathBuf::from(sidecar)
}

/// Record the current digest of `path`; returns it.
pub fn write_sidecar(path: &Path) -> Result<String> {
    let digest = digest_file(path)?;
    io::write_text(&sidecar_path(path), &digest)?;
    Ok(digest)
}

pub fn check_sidecar(path: &Path) -> Result<SidecarCheck> {
    let sidecar = sidecar_path(path);
    let expected = match std::fs::read_to_string(&sidecar) {
        Ok(expected) => expected,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SidecarCheck::Missing),
        Err(e) => return Err(Error::io(sidecar, e)),
    };
    if !is_digest(expected.trim()) {
        return Ok(SidecarCheck::Mismatch);
    }
    if digest_file(path)? == expected.trim() {
        Ok(SidecarCheck::Matches)
    } else {
        Ok(SidecarCheck::Mismatch)
    }
}
