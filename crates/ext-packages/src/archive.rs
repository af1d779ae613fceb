//! Package archive handling.
//!
//! Archives are zip files with the manifest at the root. All zip work is
//! blocking and runs on the blocking thread pool.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::MANIFEST_EXTENSION;
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;

/// Open the archive and read every entry, checking CRCs.
pub async fn verify(path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || verify_blocking(&path)).await?
}

pub fn verify_blocking(path: &Path) -> Result<()> {
    let mut archive = open(path)?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::archive(path, e))?;
        io::copy(&mut entry, &mut io::sink()).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// Read the manifest stored at the root of the archive.
pub async fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_manifest_blocking(&path)).await?
}

pub fn read_manifest_blocking(path: &Path) -> Result<PackageManifest> {
    let mut archive = open(path)?;
    let name = archive
        .file_names()
        .find(|name| {
            !name.contains('/')
                && Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
        })
        .map(str::to_string)
        .ok_or_else(|| Error::ManifestNotFound(path.to_path_buf()))?;

    let mut xml = String::new();
    archive
        .by_name(&name)
        .map_err(|e| Error::archive(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::io(path, e))?;
    PackageManifest::parse(&xml)
}

/// Extract `archive` into `<directory>/<archive stem>`.
///
/// Returns the extraction directory. Nothing is written when it already
/// exists.
pub async fn extract_to_directory(archive: &Path, directory: &Path) -> Result<PathBuf> {
    let archive = archive.to_path_buf();
    let directory = directory.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, &directory)).await?
}

fn extract_blocking(archive_path: &Path, directory: &Path) -> Result<PathBuf> {
    let stem = archive_path
        .file_stem()
        .ok_or_else(|| Error::ManifestNotFound(archive_path.to_path_buf()))?;
    let target = directory.join(stem);
    if target.exists() {
        tracing::debug!(directory = %target.display(), "Package already extracted");
        return Ok(target);
    }

    let mut partial = target.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    if partial.exists() {
        std::fs::remove_dir_all(&partial).map_err(|e| Error::io(&partial, e))?;
    }
    std::fs::create_dir_all(&partial).map_err(|e| Error::io(&partial, e))?;

    let mut archive = open(archive_path)?;
    archive
        .extract(&partial)
        .map_err(|e| Error::archive(archive_path, e))?;
    std::fs::rename(&partial, &target).map_err(|e| Error::io(&target, e))?;

    tracing::info!(archive = %archive_path.display(), directory = %target.display(), "Extracted package");
    Ok(target)
}

fn open(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    ZipArchive::new(file).map_err(|e| Error::archive(path, e))
}
