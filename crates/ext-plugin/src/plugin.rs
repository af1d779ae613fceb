//! The plugin trait and the exported declaration a module uses to announce it.

use crate::configure::{ConfigureArgs, ConfigureOutcome};
use crate::context::PluginContext;
use crate::error::PluginResult;
use crate::services::ServiceRegistry;

/// Bumped whenever the layout of [`PluginDeclaration`] or the [`Plugin`]
/// vtable changes incompatibly.
pub const ABI_VERSION: u32 = 1;

/// Version of this SDK crate; host and plugin must agree on it.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol under which a module exports its [`PluginDeclaration`].
pub const DECLARATION_SYMBOL: &[u8] = b"EXTMAN_PLUGIN_DECLARATION\0";

/// Builds the startup object of a plugin from the host-provided context.
///
/// Returning `None` means the plugin cannot start with what the host offers;
/// the module stays loaded but contributes no startup object.
pub type PluginFactory = fn(&PluginContext) -> Option<Box<dyn Plugin>>;

/// Static description exported by every plugin module.
#[derive(Debug, Clone, Copy)]
pub struct PluginDeclaration {
    pub abi_version: u32,
    pub sdk_version: &'static str,
    pub name: &'static str,
    pub create: PluginFactory,
}

impl PluginDeclaration {
    pub const fn new(name: &'static str, create: PluginFactory) -> Self {
        Self {
            abi_version: ABI_VERSION,
            sdk_version: SDK_VERSION,
            name,
            create,
        }
    }

    /// Whether this declaration was built against the same SDK as the host.
    pub fn is_compatible(&self) -> bool {
        self.abi_version == ABI_VERSION && self.sdk_version == SDK_VERSION
    }
}

/// The startup object of a loaded plugin.
///
/// Both callbacks are optional; a plugin that only needs to be loaded can
/// implement [`Plugin::name`] alone.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    /// Register the plugin's services into the host's registry.
    fn configure_services(&mut self, services: &mut dyn ServiceRegistry) -> PluginResult<()> {
        let _ = services;
        Ok(())
    }

    /// React to a configuration broadcast from the host.
    ///
    /// Implementations match the argument list with the typed accessors on
    /// [`ConfigureArgs`] and return [`ConfigureOutcome::Ignored`] when no
    /// handler fits.
    fn configure(&mut self, args: &ConfigureArgs) -> PluginResult<ConfigureOutcome> {
        let _ = args;
        Ok(ConfigureOutcome::Ignored)
    }
}

/// Export a [`PluginDeclaration`] from the current crate.
///
/// ```rust,ignore
/// ext_plugin::declare_plugin!("demo_plugin", create);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($name:expr, $factory:path) => {
        #[unsafe(no_mangle)]
        pub static EXTMAN_PLUGIN_DECLARATION: $crate::PluginDeclaration =
            $crate::PluginDeclaration::new($name, $factory);
    };
}
