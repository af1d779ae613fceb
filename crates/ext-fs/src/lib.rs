//! Filesystem layer for the extension manager
//!
//! Provides the plugin directory layout, locked atomic writes, checksum sidecars
//! and format-agnostic configuration loading.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod layout;

pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use layout::ExtensionLayout;
