//! Plugin activation and configuration broadcasts.
//!
//! Per module: `Loaded` when the module exports no plugin or its factory
//! declines, `Activated` once a plugin object exists, `ServicesConfigured`
//! once its services were registered. Plugin failures and panics are logged
//! and never abort the other modules.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, PoisonError};

use ext_plugin::{ConfigureArgs, ConfigureOutcome, Plugin, PluginContext, ServiceRegistry};

use crate::loader::LoadedModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Loaded,
    Activated,
    ServicesConfigured,
}

/// A plugin object together with the module that created it.
pub struct ActivatedPlugin {
    pub module: String,
    pub plugin: Box<dyn Plugin>,
}

impl std::fmt::Debug for ActivatedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivatedPlugin")
            .field("module", &self.module)
            .field("plugin", &self.plugin.name())
            .finish()
    }
}

/// Create the module's plugin and let it register its services.
pub fn activate(
    module: &LoadedModule,
    context: &PluginContext,
    registry: &Mutex<dyn ServiceRegistry>,
) -> (ModuleState, Option<ActivatedPlugin>) {
    let Some(declaration) = module.declaration else {
        return (ModuleState::Loaded, None);
    };

    let created = catch_unwind(AssertUnwindSafe(|| (declaration.create)(context)));
    let mut plugin = match created {
        Ok(Some(plugin)) => plugin,
        Ok(None) => {
            tracing::debug!(module = %module.name, "Plugin factory declined");
            return (ModuleState::Loaded, None);
        }
        Err(_) => {
            tracing::error!(module = %module.name, "Plugin factory panicked");
            return (ModuleState::Loaded, None);
        }
    };
    tracing::info!(module = %module.name, plugin = %plugin.name(), "Activated plugin");

    let configured = {
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        catch_unwind(AssertUnwindSafe(|| plugin.configure_services(&mut *registry)))
    };
    let state = match configured {
        Ok(Ok(())) => ModuleState::ServicesConfigured,
        Ok(Err(e)) => {
            tracing::error!(module = %module.name, error = %e, "Plugin failed to configure services");
            ModuleState::Activated
        }
        Err(_) => {
            tracing::error!(module = %module.name, "Plugin panicked while configuring services");
            ModuleState::Activated
        }
    };

    (
        state,
        Some(ActivatedPlugin {
            module: module.name.clone(),
            plugin,
        }),
    )
}

/// Offer `args` to every plugin; returns how many handled it.
pub fn broadcast_configure(plugins: &mut [ActivatedPlugin], args: &ConfigureArgs) -> usize {
    let mut handled = 0;
    for activated in plugins.iter_mut() {
        let outcome = catch_unwind(AssertUnwindSafe(|| activated.plugin.configure(args)));
        match outcome {
            Ok(Ok(ConfigureOutcome::Handled)) => handled += 1,
            Ok(Ok(ConfigureOutcome::Ignored)) => {}
            Ok(Err(e)) => {
                tracing::error!(module = %activated.module, error = %e, "Plugin configure failed");
            }
            Err(_) => {
                tracing::error!(module = %activated.module, "Plugin panicked during configure");
            }
        }
    }
    handled
}
