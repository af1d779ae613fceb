//! Plugin contract for the extension manager.
//!
//! A loadable module participates by exporting a [`PluginDeclaration`] under
//! the well-known [`DECLARATION_SYMBOL`], usually through
//! [`declare_plugin!`]. The manager hands the declared factory a fixed
//! [`PluginContext`]; the returned [`Plugin`] then registers its services and
//! receives later [`ConfigureArgs`] broadcasts.
//!
//! ```rust,ignore
//! use ext_plugin::{Plugin, PluginContext, PluginResult, ServiceDescriptor, ServiceRegistry};
//!
//! struct Startup;
//!
//! impl Plugin for Startup {
//!     fn name(&self) -> &str {
//!         "my-plugin"
//!     }
//!
//!     fn configure_services(&mut self, services: &mut dyn ServiceRegistry) -> PluginResult<()> {
//!         services.add(ServiceDescriptor::singleton("greeting", String::from("hello")));
//!         Ok(())
//!     }
//! }
//!
//! fn create(_context: &PluginContext) -> Option<Box<dyn Plugin>> {
//!     Some(Box::new(Startup))
//! }
//!
//! ext_plugin::declare_plugin!("my_plugin", create);
//! ```

pub mod configuration;
pub mod configure;
pub mod context;
pub mod error;
pub mod logger;
pub mod plugin;
pub mod services;

pub use configuration::Configuration;
pub use configure::{ArgKind, ConfigureArg, ConfigureArgs, ConfigureOutcome, FromConfigureArg, SharedList, TextCallback};
pub use context::{ExtensionHost, PluginContext};
pub use error::{PluginError, PluginResult};
pub use logger::{LogLevel, LogSink, PluginLogger};
pub use plugin::{ABI_VERSION, DECLARATION_SYMBOL, Plugin, PluginDeclaration, PluginFactory, SDK_VERSION};
pub use services::{ServiceCollection, ServiceDescriptor, ServiceLifetime, ServiceRegistry};
