//! Builds the manager a command runs against.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ext_core::{ExtensionManager, ExtensionManagerSettings};
use ext_fs::ConfigStore;
use ext_plugin::{Configuration, ServiceCollection, ServiceRegistry};

use crate::error::Result;

/// Host configuration from `path`, or an empty one.
pub fn load_configuration(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::empty());
    };
    let value: serde_json::Value = ConfigStore::new().load(path)?;
    tracing::debug!(path = %path.display(), "Loaded host configuration");
    Ok(Configuration::new(value))
}

pub struct HostContext {
    pub manager: ExtensionManager,
    pub services: Arc<Mutex<ServiceCollection>>,
}

impl HostContext {
    pub fn open(config: Option<&Path>) -> Result<Self> {
        let configuration = load_configuration(config)?;
        let settings = ExtensionManagerSettings::from_configuration(&configuration)?;
        let services = Arc::new(Mutex::new(ServiceCollection::new()));
        let registry: Arc<Mutex<dyn ServiceRegistry>> = services.clone();
        let manager = ExtensionManager::new(registry, configuration, settings)?;
        Ok(Self { manager, services })
    }

    pub fn service_count(&self) -> usize {
        self.services
            .lock()
            .map(|services| services.len())
            .unwrap_or_default()
    }
}
