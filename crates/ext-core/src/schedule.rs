//! Persisted install/uninstall schedule.
//!
//! The schedule records package changes to apply on the next load. A package
//! id is in at most one of the two lists, and at most once in each.
//!
//! ```json
//! { "Install": ["DemoPlugin:1.0.1", "Other"], "Uninstall": ["Old"] }
//! ```

use std::path::{Path, PathBuf};

use ext_fs::RobustnessConfig;
use ext_packages::PackageRequest;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// `"Id"` or `"Id:Version"` entries, in insertion order.
    #[serde(rename = "Install", default)]
    pub install: Vec<String>,
    #[serde(rename = "Uninstall", alias = "UnInstall", default)]
    pub uninstall: Vec<String>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }

    /// Replace any entry for `id` with a fresh install entry.
    pub fn schedule_install(&mut self, id: &str, version: Option<&str>) {
        let prefix = format!("{id}:");
        self.uninstall.retain(|entry| entry != id);
        self.install
            .retain(|entry| entry != id && !entry.starts_with(&prefix));

        match version.map(str::trim).filter(|v| !v.is_empty()) {
            Some(version) => self.install.push(format!("{id}:{version}")),
            None => self.install.push(id.to_string()),
        }
    }

    /// Drop any install entry for `id` and record the uninstall once.
    pub fn schedule_uninstall(&mut self, id: &str) {
        let prefix = format!("{id}:");
        self.install
            .retain(|entry| entry != id && !entry.starts_with(&prefix));
        if !self.uninstall.iter().any(|entry| entry == id) {
            self.uninstall.push(id.to_string());
        }
    }

    /// Whether `id` is scheduled for install, and the pinned version (empty
    /// when unpinned or not scheduled).
    pub fn is_scheduled_to_install(&self, id: &str) -> (bool, String) {
        let prefix = format!("{id}:");
        for entry in &self.install {
            if entry == id {
                return (true, String::new());
            }
            if let Some(version) = entry.strip_prefix(&prefix) {
                return (true, version.to_string());
            }
        }
        (false, String::new())
    }

    pub fn is_scheduled_to_uninstall(&self, id: &str) -> bool {
        self.uninstall.iter().any(|entry| entry == id)
    }

    /// Install entries as requests; malformed entries are logged and dropped.
    pub fn install_requests(&self) -> Vec<PackageRequest> {
        self.install
            .iter()
            .filter_map(|entry| match PackageRequest::parse(entry) {
                Ok(request) => Some(request),
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Ignoring schedule entry");
                    None
                }
            })
            .collect()
    }
}

/// The schedule document of one manager.
///
/// Every read-modify-write goes through a single permit so concurrent
/// callers on the same manager cannot lose updates.
#[derive(Debug)]
pub struct ScheduleStore {
    path: PathBuf,
    permit: Semaphore,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            permit: Semaphore::new(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn lock(&self) -> Result<SemaphorePermit<'_>> {
        self.permit.acquire().await.map_err(|_| Error::ScheduleLock)
    }

    /// Missing or unreadable documents read as an empty schedule.
    async fn read(&self) -> Schedule {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Schedule::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read schedule");
                return Schedule::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt schedule");
                Schedule::default()
            }
        }
    }

    async fn write(&self, schedule: &Schedule) -> Result<()> {
        let content = serde_json::to_vec_pretty(schedule)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            ext_fs::io::write_atomic(&path, &content, RobustnessConfig::default())
        })
        .await??;
        Ok(())
    }

    pub async fn load(&self) -> Result<Schedule> {
        let _permit = self.lock().await?;
        Ok(self.read().await)
    }

    pub async fn save(&self, schedule: &Schedule) -> Result<()> {
        let _permit = self.lock().await?;
        self.write(schedule).await
    }

    /// Delete the document; absence is not an error.
    pub async fn remove(&self) -> Result<()> {
        let _permit = self.lock().await?;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::info!(path = %self.path.display(), "Removed schedule"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not remove schedule");
            }
        }
        Ok(())
    }

    pub async fn schedule_install(&self, id: &str, version: Option<&str>) -> Result<()> {
        let _permit = self.lock().await?;
        let mut schedule = self.read().await;
        schedule.schedule_install(id, version);
        self.write(&schedule).await
    }

    pub async fn schedule_uninstall(&self, id: &str) -> Result<()> {
        let _permit = self.lock().await?;
        let mut schedule = self.read().await;
        schedule.schedule_uninstall(id);
        self.write(&schedule).await
    }

    pub async fn is_scheduled_to_install(&self, id: &str) -> Result<(bool, String)> {
        let _permit = self.lock().await?;
        Ok(self.read().await.is_scheduled_to_install(id))
    }

    pub async fn is_scheduled_to_uninstall(&self, id: &str) -> Result<bool> {
        let _permit = self.lock().await?;
        Ok(self.read().await.is_scheduled_to_uninstall(id))
    }
}
