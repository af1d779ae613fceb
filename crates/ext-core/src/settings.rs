//! Extension manager settings.
//!
//! Bound from the `Extensions` section of the host configuration:
//!
//! ```json
//! {
//!   "Extensions": {
//!     "Sources": [
//!       "./feed",
//!       { "Uri": "https://feed.example/v3", "Username": "u", "Password": "p", "Searchable": false }
//!     ],
//!     "Packages": ["DemoPlugin", "Other:1.2.0"],
//!     "Blacklist": ["^Internal\\."],
//!     "IgnoreSchedule": false,
//!     "IgnoreInstalledExtensionPackages": false
//!   }
//! }
//! ```

use std::path::Path;

use ext_fs::ExtensionLayout;
use ext_packages::PackageRequest;
use ext_plugin::Configuration;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use ext_packages::ExtensionSource;

/// Configuration section holding the settings.
pub const EXTENSIONS_SECTION: &str = "Extensions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExtensionManagerSettings {
    pub plugins_directory: String,
    pub plugins_dependencies_directory: String,
    pub cache_directory: String,
    /// `"Id"` or `"Id:Version"` entries.
    pub packages: Vec<String>,
    pub sources: Vec<ExtensionSource>,
    /// Ids or case-insensitive regular expressions hidden from browsing.
    pub blacklist: Vec<String>,
    /// Activate plugins after loading.
    pub initialize: bool,
    pub ignore_schedule: bool,
    #[serde(alias = "IgnoreInstalledPackage")]
    pub ignore_installed_extension_packages: bool,
}

impl Default for ExtensionManagerSettings {
    fn default() -> Self {
        Self {
            plugins_directory: "plugins".to_string(),
            plugins_dependencies_directory: "lib".to_string(),
            cache_directory: "cache".to_string(),
            packages: Vec::new(),
            sources: Vec::new(),
            blacklist: Vec::new(),
            initialize: true,
            ignore_schedule: false,
            ignore_installed_extension_packages: false,
        }
    }
}

impl ExtensionManagerSettings {
    /// Settings from the `Extensions` section; defaults when it is absent.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self> {
        let section = configuration.section(EXTENSIONS_SECTION);
        if !section.exists() {
            return Ok(Self::default());
        }
        section.bind().map_err(|e| Error::InvalidSettings {
            message: e.to_string(),
        })
    }

    /// Settings with every directory rooted under `base`.
    pub fn rooted_at(base: &Path) -> Self {
        let dir = |name: &str| base.join(name).display().to_string();
        Self {
            plugins_directory: dir("plugins"),
            plugins_dependencies_directory: dir("lib"),
            cache_directory: dir("cache"),
            ..Self::default()
        }
    }

    pub fn layout(&self) -> Result<ExtensionLayout> {
        Ok(ExtensionLayout::new(
            &self.plugins_directory,
            &self.plugins_dependencies_directory,
            &self.cache_directory,
        )?)
    }

    /// Parsed package entries; malformed entries are logged and dropped.
    pub fn package_requests(&self) -> Vec<PackageRequest> {
        self.packages
            .iter()
            .filter_map(|entry| match PackageRequest::parse(entry) {
                Ok(request) => Some(request),
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Ignoring package entry");
                    None
                }
            })
            .collect()
    }

    /// Local source paths made absolute against the working directory.
    pub(crate) fn absolutize_sources(&mut self) {
        for source in &mut self.sources {
            if source.is_remote() || source.uri.starts_with("file://") {
                continue;
            }
            if let Ok(path) = ext_fs::layout::absolutize(Path::new(&source.uri)) {
                source.uri = path.display().to_string();
            }
        }
    }
}
