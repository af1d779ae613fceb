//! What the manager exposes to plugins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ext_fs::ExtensionLayout;
use ext_plugin::{ExtensionHost, LogLevel, LogSink};

use crate::loader::ModuleLoader;

/// The extension-manager capability handed to plugin factories.
pub struct HostHandle {
    layout: ExtensionLayout,
    loader: Arc<dyn ModuleLoader>,
}

impl HostHandle {
    pub fn new(layout: ExtensionLayout, loader: Arc<dyn ModuleLoader>) -> Self {
        Self { layout, loader }
    }
}

impl ExtensionHost for HostHandle {
    fn plugins_directory(&self) -> &Path {
        &self.layout.plugins_dir
    }

    fn dependencies_directory(&self) -> &Path {
        &self.layout.dependencies_dir
    }

    fn loaded_modules(&self) -> Vec<String> {
        self.loader.modules().into_iter().map(|m| m.name).collect()
    }

    fn resolve_library(&self, file_name: &str) -> Option<PathBuf> {
        self.loader.resolve_library(file_name)
    }
}

/// Re-emits plugin log records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(plugin = %scope, "{message}"),
            LogLevel::Debug => tracing::debug!(plugin = %scope, "{message}"),
            LogLevel::Info => tracing::info!(plugin = %scope, "{message}"),
            LogLevel::Warn => tracing::warn!(plugin = %scope, "{message}"),
            LogLevel::Error => tracing::error!(plugin = %scope, "{message}"),
        }
    }
}
