//! Target-platform monikers.
//!
//! A moniker names the platform a dependency group or a module directory
//! applies to. The current process accepts, in descending preference,
//! `<os>-<arch>`, `<os>` and `any`.

use std::env::consts::{ARCH, DLL_EXTENSION, OS};
use std::path::{Path, PathBuf};

use crate::manifest::{ANY_TARGET, DependencyGroup};

/// Directory inside an extracted package holding per-target module folders.
pub const LIB_DIRECTORY: &str = "lib";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMonikers {
    monikers: Vec<String>,
}

impl TargetMonikers {
    /// Explicit preference list, most preferred first.
    pub fn new<I, S>(monikers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            monikers: monikers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn current() -> Self {
        Self::new([format!("{OS}-{ARCH}"), OS.to_string(), ANY_TARGET.to_string()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.monikers
    }

    pub fn contains(&self, target: &str) -> bool {
        self.monikers.iter().any(|m| m.eq_ignore_ascii_case(target))
    }

    /// The single dependency group that applies, by moniker preference.
    pub fn select_group<'a>(&self, groups: &'a [DependencyGroup]) -> Option<&'a DependencyGroup> {
        self.monikers.iter().find_map(|moniker| {
            groups
                .iter()
                .find(|group| group.target.eq_ignore_ascii_case(moniker))
        })
    }

    /// `lib/<moniker>` directory of an extracted package holding modules for
    /// the most preferred moniker.
    pub fn module_directory(&self, package_dir: &Path) -> Option<PathBuf> {
        self.monikers
            .iter()
            .map(|moniker| package_dir.join(LIB_DIRECTORY).join(moniker))
            .find(|dir| !module_files_in(dir).is_empty())
    }

    /// Loadable module files of an extracted package, sorted by name.
    pub fn module_files(&self, package_dir: &Path) -> Vec<PathBuf> {
        self.module_directory(package_dir)
            .map(|dir| module_files_in(&dir))
            .unwrap_or_default()
    }
}

impl Default for TargetMonikers {
    fn default() -> Self {
        Self::current()
    }
}

fn module_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(DLL_EXTENSION))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageDependency;
    use crate::version::VersionRange;
    use tempfile::TempDir;

    fn group(target: &str, dep: &str) -> DependencyGroup {
        DependencyGroup {
            target: target.to_string(),
            dependencies: vec![PackageDependency {
                id: dep.to_string(),
                range: VersionRange::any(),
            }],
        }
    }

    #[test]
    fn current_ends_with_any() {
        let monikers = TargetMonikers::current();
        assert_eq!(monikers.as_slice().len(), 3);
        assert_eq!(monikers.as_slice()[2], ANY_TARGET);
        assert!(monikers.contains(OS));
    }

    #[test]
    fn select_group_takes_most_preferred_only() {
        let monikers = TargetMonikers::new(["linux-x86_64", "linux", "any"]);
        let groups = vec![group("any", "Generic"), group("LINUX", "Os"), group("windows", "Win")];
        let selected = monikers.select_group(&groups).unwrap();
        assert_eq!(selected.dependencies[0].id, "Os");
    }

    #[test]
    fn select_group_none_for_foreign_targets() {
        let monikers = TargetMonikers::new(["linux", "any"]);
        assert!(monikers.select_group(&[group("windows", "Win")]).is_none());
    }

    #[test]
    fn module_directory_skips_empty_preferred_folder() {
        let temp = TempDir::new().unwrap();
        let monikers = TargetMonikers::new(["special", "any"]);
        std::fs::create_dir_all(temp.path().join("lib/special")).unwrap();
        std::fs::create_dir_all(temp.path().join("lib/any")).unwrap();
        let module = temp.path().join("lib/any").join(format!("libdemo.{DLL_EXTENSION}"));
        std::fs::write(&module, b"").unwrap();
        std::fs::write(temp.path().join("lib/any/readme.txt"), b"").unwrap();

        assert_eq!(monikers.module_directory(temp.path()), Some(temp.path().join("lib/any")));
        assert_eq!(monikers.module_files(temp.path()), vec![module]);
    }
}
