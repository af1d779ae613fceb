//! Package browsing: `list`, `show` and `installed`.

use colored::Colorize;
use ext_core::ExtensionPackage;
use futures::StreamExt;

use crate::context::HostContext;
use crate::error::{CliError, Result};

pub async fn run_list(context: &HostContext, skip: usize, take: usize, json: bool) -> Result<()> {
    let packages: Vec<ExtensionPackage> = context
        .manager
        .available_extension_packages(skip, take)
        .collect()
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    println!("{}", "Available Packages".bold());
    println!();
    for package in &packages {
        print_row(package);
    }
    println!();
    println!("{} {} package(s)", "Total:".dimmed(), packages.len());
    Ok(())
}

pub async fn run_show(context: &HostContext, id: &str, json: bool) -> Result<()> {
    let package = context
        .manager
        .extension_package_by_id(id)
        .await
        .ok_or_else(|| CliError::user(format!("Package '{id}' was not found")))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&package)?);
        return Ok(());
    }

    println!("{}", package.id.cyan().bold());
    match &package.versions {
        Some(versions) => {
            let versions: Vec<String> = versions.iter().map(ToString::to_string).collect();
            println!("   {} {}", "Versions:".dimmed(), versions.join(", "));
        }
        None => println!("   {} {}", "Versions:".dimmed(), "not offered by any source".yellow()),
    }
    match &package.installed_version {
        Some(version) => println!("   {} {}", "Installed:".dimmed(), version),
        None => println!("   {} no", "Installed:".dimmed()),
    }
    if package.has_update() {
        println!("   {} {}", "Update:".dimmed(), "available".green());
    }
    Ok(())
}

pub async fn run_installed(context: &HostContext) -> Result<()> {
    let installed = context.manager.installed_packages().await;
    if installed.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("{}", "Installed Packages".bold());
    println!();
    for package in installed.iter() {
        println!(
            "  {:<32} {:<12} {}",
            package.id.green(),
            package.version.to_string(),
            package.directory.display().to_string().dimmed()
        );
    }
    Ok(())
}

fn print_row(package: &ExtensionPackage) {
    let latest = package
        .latest_version()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    let installed = package
        .installed_version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let marker = if package.has_update() { "*" } else { "" };
    println!(
        "  {:<32} {:<12} {}{}",
        package.id.green(),
        latest,
        installed.dimmed(),
        marker.yellow()
    );
}
