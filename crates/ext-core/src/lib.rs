//! Extension lifecycle for hosts that load plugins from package feeds.
//!
//! [`ExtensionManager`] merges the configured packages, the persisted
//! install/uninstall [`Schedule`] and the packages already on disk into a
//! pending set, materializes each package through the feeds, loads the
//! resulting modules and activates their plugins against the host's service
//! registry.
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//!
//! use ext_core::{ExtensionManager, ExtensionManagerSettings};
//! use ext_plugin::{Configuration, ServiceCollection, ServiceRegistry};
//!
//! # async fn run() -> ext_core::Result<()> {
//! let registry: Arc<Mutex<dyn ServiceRegistry>> = Arc::new(Mutex::new(ServiceCollection::new()));
//! let settings = ExtensionManagerSettings {
//!     packages: vec!["DemoPlugin".to_string()],
//!     ..Default::default()
//! };
//! let manager = ExtensionManager::new(registry, Configuration::empty(), settings)?;
//! manager.load_extension_packages().await?;
//! # Ok(())
//! # }
//! ```

pub mod activator;
pub mod blacklist;
pub mod error;
pub mod host;
pub mod installed;
pub mod loader;
pub mod manager;
pub mod package;
pub mod schedule;
pub mod settings;

pub use activator::{ActivatedPlugin, ModuleState};
pub use blacklist::Blacklist;
pub use error::{Error, Result};
pub use host::{HostHandle, TracingSink};
pub use installed::{InstalledPackage, InstalledPackages};
pub use loader::{BuiltinModuleLoader, LoadedModule, ModuleCache, ModuleLoader, NativeModuleLoader, SearchPaths};
pub use manager::{ExtensionManager, ExtensionManagerBuilder, MANAGER_SERVICE, add_extensions};
pub use package::ExtensionPackage;
pub use schedule::{Schedule, ScheduleStore};
pub use settings::{EXTENSIONS_SECTION, ExtensionManagerSettings, ExtensionSource};
