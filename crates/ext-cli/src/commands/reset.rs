//! `extman reset`

use colored::Colorize;

use crate::context::HostContext;
use crate::error::Result;

pub async fn run_reset(context: &HostContext) -> Result<()> {
    context.manager.reset().await;
    for directory in context.manager.layout().all() {
        let status = if directory.exists() {
            "kept".yellow()
        } else {
            "removed".green()
        };
        println!("  {:<8} {}", status, directory.display());
    }
    Ok(())
}
