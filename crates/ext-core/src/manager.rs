//! The extension manager.
//!
//! One manager owns one plugin layout: it applies the install schedule,
//! acquires configured packages from the configured sources, loads their
//! modules through its [`ModuleLoader`] and activates the plugins they
//! declare.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ext_fs::ExtensionLayout;
use ext_packages::{
    ArtifactCache, DependencyResolver, FeedProvider, LocalFeedProvider, MaterializeRole,
    PackageFeed, PackageIdentity, PackageRequest, RetryPolicy, TargetMonikers,
};
use ext_plugin::{
    ConfigureArgs, Configuration, ExtensionHost, LogSink, PluginContext, PluginLogger,
    ServiceCollection, ServiceDescriptor, ServiceRegistry,
};
use futures::Stream;

use crate::activator::{self, ActivatedPlugin, ModuleState};
use crate::blacklist::Blacklist;
use crate::host::{HostHandle, TracingSink};
use crate::installed::{self, InstalledPackages};
use crate::loader::{LoadedModule, ModuleLoader, NativeModuleLoader, SearchPaths};
use crate::package::ExtensionPackage;
use crate::schedule::{Schedule, ScheduleStore};
use crate::settings::{EXTENSIONS_SECTION, ExtensionManagerSettings};
use crate::{Error, Result};

/// Name under which [`add_extensions`] registers the manager.
pub const MANAGER_SERVICE: &str = "ExtensionManager";

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ExtensionManager {
    // Declared first: plugin objects must drop before the loader that owns
    // their code.
    plugins: Mutex<Vec<ActivatedPlugin>>,
    states: Mutex<Vec<(String, ModuleState)>>,
    loader: Arc<dyn ModuleLoader>,
    host: Arc<HostHandle>,
    settings: ExtensionManagerSettings,
    layout: ExtensionLayout,
    configuration: Configuration,
    registry: Arc<Mutex<dyn ServiceRegistry>>,
    feed_provider: Arc<dyn FeedProvider>,
    schedule: ScheduleStore,
    blacklist: Blacklist,
    retry: RetryPolicy,
    targets: TargetMonikers,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .field("modules", &self.loader.modules().len())
            .finish_non_exhaustive()
    }
}

/// Configures and builds an [`ExtensionManager`].
pub struct ExtensionManagerBuilder {
    settings: ExtensionManagerSettings,
    registry: Option<Arc<Mutex<dyn ServiceRegistry>>>,
    configuration: Configuration,
    feed_provider: Arc<dyn FeedProvider>,
    loader: Option<Arc<dyn ModuleLoader>>,
    retry: RetryPolicy,
    targets: TargetMonikers,
    sink: Arc<dyn LogSink>,
}

impl ExtensionManagerBuilder {
    pub fn new(settings: ExtensionManagerSettings) -> Self {
        Self {
            settings,
            registry: None,
            configuration: Configuration::empty(),
            feed_provider: Arc::new(LocalFeedProvider),
            loader: None,
            retry: RetryPolicy::default(),
            targets: TargetMonikers::current(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Registry that activated plugins add their services to.
    pub fn registry(mut self, registry: Arc<Mutex<dyn ServiceRegistry>>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Host configuration handed to plugins.
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Builds feeds for the configured sources. Defaults to local feeds only.
    pub fn feed_provider(mut self, provider: Arc<dyn FeedProvider>) -> Self {
        self.feed_provider = provider;
        self
    }

    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn targets(mut self, targets: TargetMonikers) -> Self {
        self.targets = targets;
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Result<ExtensionManager> {
        let mut settings = self.settings;
        settings.absolutize_sources();
        let layout = settings.layout()?;

        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(NativeModuleLoader::new(SearchPaths::default())));
        loader.set_search_paths(SearchPaths::new(vec![
            layout.dependencies_dir.clone(),
            layout.plugins_dir.clone(),
        ]));

        let registry = self.registry.unwrap_or_else(|| {
            let registry: Arc<Mutex<dyn ServiceRegistry>> =
                Arc::new(Mutex::new(ServiceCollection::new()));
            registry
        });

        tracing::debug!(
            plugins = %layout.plugins_dir.display(),
            dependencies = %layout.dependencies_dir.display(),
            cache = %layout.cache_dir.display(),
            sources = settings.sources.len(),
            "Created extension manager"
        );

        Ok(ExtensionManager {
            plugins: Mutex::new(Vec::new()),
            states: Mutex::new(Vec::new()),
            host: Arc::new(HostHandle::new(layout.clone(), Arc::clone(&loader))),
            loader,
            blacklist: Blacklist::new(&settings.blacklist),
            schedule: ScheduleStore::new(layout.schedule_path()),
            settings,
            layout,
            configuration: self.configuration,
            registry,
            feed_provider: self.feed_provider,
            retry: self.retry,
            targets: self.targets,
            sink: self.sink,
        })
    }
}

impl ExtensionManager {
    /// A manager reading local sources and loading native modules.
    pub fn new(
        registry: Arc<Mutex<dyn ServiceRegistry>>,
        configuration: Configuration,
        settings: ExtensionManagerSettings,
    ) -> Result<Self> {
        Self::builder(settings)
            .registry(registry)
            .configuration(configuration)
            .build()
    }

    pub fn builder(settings: ExtensionManagerSettings) -> ExtensionManagerBuilder {
        ExtensionManagerBuilder::new(settings)
    }

    pub fn settings(&self) -> &ExtensionManagerSettings {
        &self.settings
    }

    pub fn layout(&self) -> &ExtensionLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Arc<Mutex<dyn ServiceRegistry>> {
        &self.registry
    }

    /// Apply the schedule, acquire pending packages and load their modules.
    ///
    /// Fails with [`Error::Incomplete`] when a requested package could not
    /// be acquired from any source; everything that could be loaded stays
    /// loaded and the schedule is kept for the next attempt.
    pub async fn load_extension_packages(&self) -> Result<()> {
        let plugins_dir = &self.layout.plugins_dir;

        let removed = installed::cleanup_superseded(plugins_dir).await;
        if removed > 0 {
            tracing::info!(count = removed, "Removed superseded package versions");
        }
        ext_fs::io::ensure_dir(plugins_dir).await?;

        let schedule = if self.settings.ignore_schedule {
            Schedule::new()
        } else {
            self.schedule.load().await?
        };

        for id in &schedule.uninstall {
            for directory in installed::directories_of(plugins_dir, id).await {
                tracing::info!(package = %id, directory = %directory.display(), "Uninstalling package");
                ext_fs::io::remove_dir_best_effort(&directory).await;
            }
        }

        let installed = InstalledPackages::scan(plugins_dir).await;
        let mut pending = self.pending_requests(&schedule, &installed);

        if !self.settings.ignore_installed_extension_packages {
            for package in installed.iter() {
                let superseded = schedule.is_scheduled_to_uninstall(&package.id)
                    || pending.iter().any(|request| request.matches_id(&package.id));
                if !superseded {
                    self.load_package_modules(&package.directory, &package.identity());
                }
            }
        }

        let total = pending.len();
        if total > 0 {
            let feeds = self.create_feeds(false);
            let resolver = DependencyResolver::new(
                feeds.clone(),
                ArtifactCache::new(&self.layout.cache_dir),
                &self.layout.dependencies_dir,
            )
            .with_targets(self.targets.clone())
            .with_retry_policy(self.retry);

            let loader = Arc::clone(&self.loader);
            let is_loaded = move |name: &str| loader.is_loaded(name);

            for feed in &feeds {
                if pending.is_empty() {
                    break;
                }
                let mut remaining = Vec::new();
                for request in pending {
                    let result = resolver
                        .ensure_from(
                            std::slice::from_ref(feed),
                            &request,
                            plugins_dir,
                            MaterializeRole::TopLevel,
                            &is_loaded,
                        )
                        .await;
                    match result {
                        Ok(materialized) => {
                            tracing::info!(
                                package = %materialized.identity.id,
                                version = %materialized.identity.version,
                                source = %feed.source().uri,
                                "Installed package"
                            );
                            self.load_package_modules(&materialized.directory, &materialized.identity);
                        }
                        Err(e) => {
                            tracing::warn!(
                                package = %request,
                                source = %feed.source().uri,
                                error = %e,
                                "Package not acquired from source"
                            );
                            remaining.push(request);
                        }
                    }
                }
                pending = remaining;
            }

            if !pending.is_empty() {
                for request in &pending {
                    tracing::error!(package = %request, "Package could not be acquired from any source");
                }
                return Err(Error::Incomplete {
                    failed: pending.len(),
                    total,
                });
            }
        }

        if !self.settings.ignore_schedule {
            if let Err(e) = self.schedule.remove().await {
                tracing::warn!(path = %self.schedule.path().display(), error = %e, "Failed to clear schedule");
            }
        }

        if self.settings.initialize {
            self.activate_new_modules();
        }
        Ok(())
    }

    /// Configured packages that still need acquiring, then scheduled installs.
    fn pending_requests(
        &self,
        schedule: &Schedule,
        installed: &InstalledPackages,
    ) -> Vec<PackageRequest> {
        let mut pending: Vec<PackageRequest> = Vec::new();
        let mut push = |request: PackageRequest| {
            if schedule.is_scheduled_to_uninstall(&request.id) {
                return;
            }
            pending.retain(|existing| !existing.matches_id(&request.id));
            pending.push(request);
        };

        for request in self.settings.package_requests() {
            // Any installed version satisfies a configured package.
            let installed_already = !self.settings.ignore_installed_extension_packages
                && installed.contains(&request.id);
            if !installed_already {
                push(request);
            }
        }
        for request in schedule.install_requests() {
            push(request);
        }
        pending
    }

    fn load_package_modules(&self, directory: &Path, package: &PackageIdentity) -> usize {
        let files = self.targets.module_files(directory);
        if files.is_empty() {
            tracing::debug!(package = %package.id, directory = %directory.display(), "Package has no modules for this platform");
        }

        let mut loaded = 0;
        for file in files {
            match self.loader.load(&file, Some(package)) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    tracing::error!(package = %package.id, path = %file.display(), error = %e, "Failed to load module");
                }
            }
        }
        loaded
    }

    /// Feeds for the configured sources; sources that cannot be opened are
    /// logged and skipped.
    fn create_feeds(&self, searchable_only: bool) -> Vec<Arc<dyn PackageFeed>> {
        self.settings
            .sources
            .iter()
            .filter(|source| !searchable_only || source.searchable)
            .filter_map(|source| match self.feed_provider.create(source) {
                Ok(feed) => Some(feed),
                Err(e) => {
                    tracing::warn!(source = %source.uri, error = %e, "Skipping package source");
                    None
                }
            })
            .collect()
    }

    fn plugin_context(&self, module: &str) -> PluginContext {
        let host: Arc<dyn ExtensionHost> = self.host.clone();
        PluginContext::new(
            self.configuration.clone(),
            host,
            PluginLogger::new(module, Arc::clone(&self.sink)),
        )
    }

    /// Activate every loaded module that has not been activated yet.
    fn activate_new_modules(&self) {
        let modules = self.loader.modules();
        let mut states = lock(&self.states);
        let mut plugins = lock(&self.plugins);
        for module in modules {
            if states.iter().any(|(name, _)| *name == module.name) {
                continue;
            }
            let context = self.plugin_context(&module.name);
            let (state, plugin) = activator::activate(&module, &context, &*self.registry);
            states.push((module.name.clone(), state));
            plugins.extend(plugin);
        }
    }

    /// Modules loaded so far, in load order.
    pub fn extension_package_modules(&self) -> Vec<LoadedModule> {
        self.loader.modules()
    }

    /// Activation state of every loaded module.
    pub fn module_states(&self) -> Vec<(String, ModuleState)> {
        let states = lock(&self.states);
        self.loader
            .modules()
            .into_iter()
            .map(|module| {
                let state = states
                    .iter()
                    .find(|(name, _)| *name == module.name)
                    .map_or(ModuleState::Loaded, |(_, state)| *state);
                (module.name, state)
            })
            .collect()
    }

    pub async fn installed_packages(&self) -> InstalledPackages {
        InstalledPackages::scan(&self.layout.plugins_dir).await
    }

    /// Browse packages offered by searchable sources, then installed packages
    /// no source offered.
    ///
    /// Blacklisted ids are never reported with versions. Each call scans
    /// afresh.
    pub fn available_extension_packages(
        &self,
        skip: usize,
        take: usize,
    ) -> impl Stream<Item = ExtensionPackage> + '_ {
        async_stream::stream! {
            let installed = InstalledPackages::scan(&self.layout.plugins_dir).await;
            let mut seen = HashSet::new();

            for feed in self.create_feeds(true) {
                let hits = match feed.search("", skip, take).await {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!(source = %feed.source().uri, error = %e, "Search failed");
                        continue;
                    }
                };
                for hit in hits {
                    if self.blacklist.is_blacklisted(&hit.id) {
                        tracing::debug!(package = %hit.id, "Hiding blacklisted package");
                        continue;
                    }
                    if !seen.insert(hit.id.to_ascii_lowercase()) {
                        continue;
                    }
                    let installed_version = installed.get(&hit.id).map(|p| p.version.clone());
                    yield ExtensionPackage {
                        id: hit.id,
                        versions: Some(hit.versions),
                        installed_version,
                    };
                }
            }

            for package in installed.iter() {
                if seen.contains(&package.id.to_ascii_lowercase()) {
                    continue;
                }
                yield ExtensionPackage {
                    id: package.id.clone(),
                    versions: None,
                    installed_version: Some(package.version.clone()),
                };
            }
        }
    }

    /// The package `id` as offered by the first searchable source that has
    /// it, combined with its installed version. `None` when nothing knows it.
    pub async fn extension_package_by_id(&self, id: &str) -> Option<ExtensionPackage> {
        let installed = InstalledPackages::scan(&self.layout.plugins_dir).await;
        let local = installed.get(id);

        let mut versions = None;
        if !self.blacklist.is_blacklisted(id) {
            for feed in self.create_feeds(true) {
                match feed.list_versions(id).await {
                    Ok(found) if !found.is_empty() => {
                        versions = Some(found);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(package = %id, source = %feed.source().uri, error = %e, "Version lookup failed");
                    }
                }
            }
        }

        if versions.is_none() && local.is_none() {
            return None;
        }
        Some(ExtensionPackage {
            id: local.map_or_else(|| id.to_string(), |p| p.id.clone()),
            versions,
            installed_version: local.map(|p| p.version.clone()),
        })
    }

    pub async fn schedule_install_extension_package(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<()> {
        self.schedule.schedule_install(id, version).await
    }

    pub async fn schedule_uninstall_extension_package(&self, id: &str) -> Result<()> {
        self.schedule.schedule_uninstall(id).await
    }

    pub async fn is_extension_package_scheduled_to_install(&self, id: &str) -> Result<(bool, String)> {
        self.schedule.is_scheduled_to_install(id).await
    }

    pub async fn is_extension_package_scheduled_to_uninstall(&self, id: &str) -> Result<bool> {
        self.schedule.is_scheduled_to_uninstall(id).await
    }

    pub async fn schedule(&self) -> Result<Schedule> {
        self.schedule.load().await
    }

    pub async fn remove_schedule(&self) -> Result<()> {
        self.schedule.remove().await
    }

    /// Delete the cache, dependencies and plugins directories.
    ///
    /// Each directory is attempted independently; failures are logged.
    pub async fn reset(&self) {
        for directory in self.layout.all() {
            if ext_fs::io::remove_dir_best_effort(directory).await {
                tracing::info!(directory = %directory.display(), "Removed directory");
            }
        }
    }

    /// Offer `args` to every activated plugin; returns how many handled it.
    pub fn configure(&self, args: &ConfigureArgs) -> usize {
        let mut plugins = lock(&self.plugins);
        activator::broadcast_configure(&mut plugins, args)
    }
}

/// Build a manager from the `Extensions` section of `configuration`,
/// register it in `registry` and load its packages.
pub async fn add_extensions(
    registry: Arc<Mutex<dyn ServiceRegistry>>,
    configuration: Configuration,
) -> Result<Arc<ExtensionManager>> {
    let settings = ExtensionManagerSettings::from_configuration(&configuration)?;
    tracing::debug!(section = EXTENSIONS_SECTION, packages = settings.packages.len(), "Adding extensions");

    let manager = Arc::new(ExtensionManager::new(
        Arc::clone(&registry),
        configuration,
        settings,
    )?);
    lock(&*registry).add(ServiceDescriptor::singleton(
        MANAGER_SERVICE,
        Arc::clone(&manager),
    ));

    manager.load_extension_packages().await?;
    Ok(manager)
}
