//! `extman load`

use colored::Colorize;
use ext_core::ModuleState;

use crate::context::HostContext;
use crate::error::Result;

pub async fn run_load(context: &HostContext) -> Result<()> {
    let manager = &context.manager;
    manager.load_extension_packages().await?;

    let states = manager.module_states();
    let modules = manager.extension_package_modules();
    println!(
        "{} Loaded {} module(s)",
        "=>".blue().bold(),
        modules.len()
    );

    for module in &modules {
        let state = states
            .iter()
            .find(|(name, _)| *name == module.name)
            .map_or(ModuleState::Loaded, |(_, state)| *state);
        let package = module
            .package
            .as_ref()
            .map(|p| format!("{} {}", p.id, p.version))
            .unwrap_or_default();
        println!(
            "   {:<24} {:<20} {}",
            module.name.cyan(),
            state_label(state),
            package.dimmed()
        );
    }

    if manager.settings().initialize {
        println!(
            "   {} {}",
            "Services registered:".dimmed(),
            context.service_count()
        );
    }
    Ok(())
}

fn state_label(state: ModuleState) -> String {
    match state {
        ModuleState::Loaded => "loaded".to_string(),
        ModuleState::Activated => "activated".yellow().to_string(),
        ModuleState::ServicesConfigured => "configured".green().to_string(),
    }
}
