//! What the host hands a plugin factory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::logger::PluginLogger;

/// Capabilities of the extension manager that plugins may use.
pub trait ExtensionHost: Send + Sync {
    /// Directory holding extracted top-level packages.
    fn plugins_directory(&self) -> &Path;

    /// Directory holding extracted dependency packages.
    fn dependencies_directory(&self) -> &Path;

    /// Names of every module loaded so far.
    fn loaded_modules(&self) -> Vec<String>;

    /// Locate a native library shipped in a plugin or dependency package.
    fn resolve_library(&self, file_name: &str) -> Option<PathBuf>;
}

/// The fixed argument pool every plugin factory receives.
#[derive(Clone)]
pub struct PluginContext {
    pub configuration: Configuration,
    pub host: Arc<dyn ExtensionHost>,
    pub logger: PluginLogger,
}

impl PluginContext {
    pub fn new(
        configuration: Configuration,
        host: Arc<dyn ExtensionHost>,
        logger: PluginLogger,
    ) -> Self {
        Self {
            configuration,
            host,
            logger,
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("configuration", &self.configuration)
            .field("plugins_directory", &self.host.plugins_directory())
            .field("logger", &self.logger.scope())
            .finish()
    }
}
