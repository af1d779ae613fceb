//! Plugin libraries built from workspace crates.

use std::collections::HashMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock};

/// Path of the shared library built from the workspace crate `crate_name`.
///
/// Looks next to the running test binary first (`target/<profile>` and its
/// `deps`), where cargo leaves `cdylib` outputs of workspace members and
/// dev-dependencies. Falls back to building the crate into a separate
/// target directory.
pub fn plugin_library(crate_name: &str) -> PathBuf {
    static BUILT: OnceLock<Mutex<HashMap<String, PathBuf>>> = OnceLock::new();
    let mut built = BUILT
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(path) = built.get(crate_name) {
        return path.clone();
    }

    let lib_name = crate_name.replace('-', "_");
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap().to_path_buf();
    let profile = deps.parent().unwrap().to_path_buf();

    let path = find_library(&profile, &lib_name)
        .or_else(|| find_library(&deps, &lib_name))
        .unwrap_or_else(|| build_library(crate_name, &lib_name, &profile));
    built.insert(crate_name.to_string(), path.clone());
    path
}

fn find_library(dir: &Path, lib_name: &str) -> Option<PathBuf> {
    let exact = format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}");
    let hashed = format!("{DLL_PREFIX}{lib_name}-");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            path.is_file()
                && (name == exact || (name.starts_with(&hashed) && name.ends_with(DLL_SUFFIX)))
        })
        .collect();
    candidates.sort_by_key(|path| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
    });
    candidates.pop()
}

fn build_library(crate_name: &str, lib_name: &str, profile: &Path) -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(crate_name)
        .join("Cargo.toml");
    let target_dir = profile.join("plugin-libraries");
    let cargo = std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo"));

    let status = Command::new(cargo)
        .args(["build", "--lib", "--manifest-path"])
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .unwrap();
    assert!(status.success(), "building {crate_name} failed");

    find_library(&target_dir.join("debug"), lib_name)
        .unwrap_or_else(|| panic!("no {lib_name} library under {}", target_dir.display()))
}
