//! `extman schedule ...`

use colored::Colorize;

use crate::cli::ScheduleAction;
use crate::context::HostContext;
use crate::error::Result;

pub async fn run_schedule(context: &HostContext, action: ScheduleAction) -> Result<()> {
    let manager = &context.manager;
    match action {
        ScheduleAction::Install { id, version } => {
            manager
                .schedule_install_extension_package(&id, version.as_deref())
                .await?;
            let pinned = version.map(|v| format!(" {v}")).unwrap_or_default();
            println!(
                "{} Scheduled install of {}{}",
                "=>".blue().bold(),
                id.cyan(),
                pinned
            );
        }
        ScheduleAction::Uninstall { id } => {
            manager.schedule_uninstall_extension_package(&id).await?;
            println!("{} Scheduled uninstall of {}", "=>".blue().bold(), id.cyan());
        }
        ScheduleAction::Show => {
            let schedule = manager.schedule().await?;
            if schedule.is_empty() {
                println!("Schedule is empty.");
                return Ok(());
            }
            println!("{}", "Install".bold());
            for entry in &schedule.install {
                println!("  {}", entry.green());
            }
            println!("{}", "Uninstall".bold());
            for entry in &schedule.uninstall {
                println!("  {}", entry.red());
            }
        }
        ScheduleAction::Clear => {
            manager.remove_schedule().await?;
            println!("{} Schedule cleared", "=>".blue().bold());
        }
        ScheduleAction::Status { id } => {
            let (install, version) = manager.is_extension_package_scheduled_to_install(&id).await?;
            let uninstall = manager.is_extension_package_scheduled_to_uninstall(&id).await?;
            if install {
                let version = if version.is_empty() { "latest".to_string() } else { version };
                println!("{} is scheduled to install ({})", id.cyan(), version);
            } else if uninstall {
                println!("{} is scheduled to uninstall", id.cyan());
            } else {
                println!("{} is not scheduled", id.cyan());
            }
        }
    }
    Ok(())
}
