//! Command implementations for extman

pub mod load;
pub mod packages;
pub mod reset;
pub mod schedule;

pub use load::run_load;
pub use packages::{run_installed, run_list, run_show};
pub use reset::run_reset;
pub use schedule::run_schedule;
