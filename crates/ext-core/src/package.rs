use ext_packages::PackageVersion;
use serde::Serialize;

/// A package as seen by browsing: what feeds offer and what is installed.
///
/// `versions` is `None` for packages only known locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtensionPackage {
    pub id: String,
    pub versions: Option<Vec<PackageVersion>>,
    pub installed_version: Option<PackageVersion>,
}

impl ExtensionPackage {
    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    pub fn latest_version(&self) -> Option<&PackageVersion> {
        self.versions.as_ref().and_then(|versions| versions.iter().max())
    }

    /// Whether a feed offers something newer than the installed version.
    pub fn has_update(&self) -> bool {
        match (self.latest_version(), &self.installed_version) {
            (Some(latest), Some(installed)) => latest > installed,
            _ => false,
        }
    }
}
