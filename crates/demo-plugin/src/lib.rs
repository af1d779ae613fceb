//! Reference plugin.
//!
//! Registers a [`Greeter`] service and answers `(TextCallback, SharedList)`
//! configure broadcasts by recording itself in the list and reporting
//! through the callback.

use ext_plugin::{
    ConfigureArgs, ConfigureOutcome, Plugin, PluginContext, PluginDeclaration, PluginLogger,
    PluginResult, ServiceDescriptor, ServiceRegistry, SharedList, TextCallback,
};

/// Service name the greeter is registered under.
pub const GREETER_SERVICE: &str = "DemoPlugin.Greeter";

/// Configuration key overriding the greeting.
pub const GREETING_KEY: &str = "DemoPlugin:Greeting";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    pub greeting: String,
}

impl Greeter {
    pub fn greet(&self, name: &str) -> String {
        format!("{}, {name}!", self.greeting)
    }
}

pub struct DemoPlugin {
    greeting: String,
    logger: PluginLogger,
}

impl Plugin for DemoPlugin {
    fn name(&self) -> &str {
        "DemoPlugin"
    }

    fn configure_services(&mut self, services: &mut dyn ServiceRegistry) -> PluginResult<()> {
        services.add(ServiceDescriptor::singleton(
            GREETER_SERVICE,
            Greeter {
                greeting: self.greeting.clone(),
            },
        ));
        self.logger.info("Registered greeter");
        Ok(())
    }

    fn configure(&mut self, args: &ConfigureArgs) -> PluginResult<ConfigureOutcome> {
        let Some((callback, list)) = args.pair::<TextCallback, SharedList>() else {
            return Ok(ConfigureOutcome::Ignored);
        };
        list.push(self.name());
        callback.call(&format!("{} configured", self.name()));
        Ok(ConfigureOutcome::Handled)
    }
}

fn create(context: &PluginContext) -> Option<Box<dyn Plugin>> {
    let greeting = context
        .configuration
        .get_str(GREETING_KEY)
        .unwrap_or("Hello")
        .to_string();
    Some(Box::new(DemoPlugin {
        greeting,
        logger: context.logger.clone(),
    }))
}

ext_plugin::declare_plugin!("demo_plugin", create);

/// The exported declaration, for hosts linking this crate directly.
pub fn declaration() -> PluginDeclaration {
    EXTMAN_PLUGIN_DECLARATION
}
