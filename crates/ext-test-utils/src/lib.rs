//! Shared test fixtures for the extension manager workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`package`]: [`PackageBuilder`] writing real `.nupkg` archives
//! - [`feed`]: [`TestFeed`], a temporary directory feed, and [`TestHost`],
//!   a temporary plugins/lib/cache root
//! - [`native`]: [`plugin_library`], the shared library of a plugin crate

pub mod feed;
pub mod native;
pub mod package;

pub use feed::{TestFeed, TestHost};
pub use native::plugin_library;
pub use package::{PackageBuilder, corrupt, module_file_name};
