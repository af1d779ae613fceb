//! End-to-end extension lifecycle: configuration, feeds, dependencies,
//! loading and activation.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use demo_plugin::{GREETER_SERVICE, Greeter};
use ext_core::{
    BuiltinModuleLoader, Error, ExtensionManager, ExtensionManagerSettings, ModuleLoader,
};
use ext_packages::{
    ExtensionSource, FeedError, FeedProvider, LocalFeed, PackageFeed, PackageIdentity,
    PackageVersion, RetryPolicy, SearchHit, TargetMonikers,
};
use ext_plugin::{Configuration, ServiceCollection, ServiceRegistry};
use ext_test_utils::{PackageBuilder, TestFeed, TestHost, module_file_name};
use pretty_assertions::assert_eq;

/// Local feeds that count archive downloads.
#[derive(Default)]
struct CountingProvider {
    downloads: Arc<AtomicUsize>,
}

struct CountingFeed {
    inner: LocalFeed,
    downloads: Arc<AtomicUsize>,
}

#[async_trait]
impl PackageFeed for CountingFeed {
    fn source(&self) -> &ExtensionSource {
        self.inner.source()
    }

    async fn list_versions(&self, id: &str) -> Result<Vec<PackageVersion>, FeedError> {
        self.inner.list_versions(id).await
    }

    async fn download(&self, package: &PackageIdentity, destination: &Path) -> Result<(), FeedError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(package, destination).await
    }

    async fn search(&self, query: &str, skip: usize, take: usize) -> Result<Vec<SearchHit>, FeedError> {
        self.inner.search(query, skip, take).await
    }
}

impl FeedProvider for CountingProvider {
    fn create(&self, source: &ExtensionSource) -> Result<Arc<dyn PackageFeed>, FeedError> {
        Ok(Arc::new(CountingFeed {
            inner: LocalFeed::new(source.clone())?,
            downloads: Arc::clone(&self.downloads),
        }))
    }
}

fn demo_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(BuiltinModuleLoader::new().register("demo_plugin", demo_plugin::declaration()))
}

fn demo(version: &str) -> PackageBuilder {
    PackageBuilder::new("DemoPlugin", version).module("any", "demo_plugin")
}

struct Host {
    dirs: TestHost,
    services: Arc<Mutex<ServiceCollection>>,
}

impl Host {
    fn new() -> Self {
        Self {
            dirs: TestHost::new(),
            services: Arc::new(Mutex::new(ServiceCollection::new())),
        }
    }

    fn registry(&self) -> Arc<Mutex<dyn ServiceRegistry>> {
        self.services.clone()
    }

    fn settings(&self, feeds: &[&TestFeed], packages: &[&str]) -> ExtensionManagerSettings {
        ExtensionManagerSettings {
            sources: feeds
                .iter()
                .map(|feed| ExtensionSource::new(feed.uri()))
                .collect(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
            ignore_schedule: true,
            ..ExtensionManagerSettings::rooted_at(self.dirs.root())
        }
    }

    fn manager(&self, settings: ExtensionManagerSettings) -> ExtensionManager {
        ExtensionManager::builder(settings)
            .registry(self.registry())
            .module_loader(demo_loader())
            .retry_policy(RetryPolicy::immediate(2))
            .targets(TargetMonikers::new(["host-x", "any"]))
            .build()
            .unwrap()
    }
}

#[tokio::test]
async fn host_configuration_drives_the_whole_lifecycle() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0"));

    let configuration = Configuration::new(serde_json::json!({
        "Extensions": {
            "PluginsDirectory": host.dirs.plugins_dir(),
            "PluginsDependenciesDirectory": host.dirs.dependencies_dir(),
            "CacheDirectory": host.dirs.cache_dir(),
            "Sources": [{ "Uri": feed.uri(), "Searchable": true }],
            "Packages": ["DemoPlugin"],
            "IgnoreSchedule": true,
            "IgnoreInstalledExtensionPackages": true
        },
        "DemoPlugin": { "Greeting": "Hey" }
    }));
    let settings = ExtensionManagerSettings::from_configuration(&configuration).unwrap();

    let manager = ExtensionManager::builder(settings)
        .registry(host.registry())
        .configuration(configuration)
        .module_loader(demo_loader())
        .targets(TargetMonikers::new(["any"]))
        .build()
        .unwrap();
    manager.load_extension_packages().await.unwrap();

    assert_eq!(manager.extension_package_modules().len(), 1);
    let services = host.services.lock().unwrap();
    assert_eq!(services.len(), 1);
    let greeter = services.get_as::<Greeter>(GREETER_SERVICE).unwrap();
    assert_eq!(greeter.greet("world"), "Hey, world!");
}

#[tokio::test]
async fn second_load_is_served_without_downloading() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0"));
    let provider = Arc::new(CountingProvider::default());

    let build = |ignore_installed: bool| {
        let mut settings = host.settings(&[&feed], &["DemoPlugin"]);
        settings.ignore_installed_extension_packages = ignore_installed;
        ExtensionManager::builder(settings)
            .registry(host.registry())
            .module_loader(demo_loader())
            .feed_provider(provider.clone())
            .targets(TargetMonikers::new(["any"]))
            .build()
            .unwrap()
    };

    build(true).load_extension_packages().await.unwrap();
    assert_eq!(provider.downloads.load(Ordering::SeqCst), 1);

    let installed = build(false);
    installed.load_extension_packages().await.unwrap();
    assert_eq!(provider.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(installed.extension_package_modules().len(), 1);
    assert!(installed.installed_packages().await.contains("DemoPlugin"));

    let cached = build(true);
    cached.load_extension_packages().await.unwrap();
    assert_eq!(provider.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(cached.extension_package_modules().len(), 1);
}

#[tokio::test]
async fn only_the_preferred_dependency_group_is_acquired() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&PackageBuilder::new("HostHelper", "1.0.0"));
    feed.publish(&PackageBuilder::new("AnyHelper", "1.0.0"));
    feed.publish(
        &demo("1.0.0")
            .target_dependency("any", "AnyHelper", None)
            .target_dependency("host-x", "HostHelper", Some("[1.0.0]")),
    );

    let manager = host.manager(host.settings(&[&feed], &["DemoPlugin"]));
    manager.load_extension_packages().await.unwrap();

    host.dirs.assert_exists("lib/HostHelper.1.0.0");
    host.dirs.assert_not_exists("lib/AnyHelper.1.0.0");
}

#[tokio::test]
async fn dependencies_already_loaded_are_not_acquired() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0").dependency("Runtime.Support", Some("1.0.0")));

    let loader = demo_loader();
    loader
        .load(&host.dirs.root().join(module_file_name("runtime_support")), None)
        .unwrap();

    let manager = ExtensionManager::builder(host.settings(&[&feed], &["DemoPlugin"]))
        .registry(host.registry())
        .module_loader(loader)
        .targets(TargetMonikers::new(["any"]))
        .build()
        .unwrap();
    manager.load_extension_packages().await.unwrap();

    host.dirs.assert_exists("plugins/DemoPlugin.1.0.0");
    host.dirs.assert_not_exists("lib/Runtime.Support.1.0.0");
    assert_eq!(manager.extension_package_modules().len(), 2);
}

#[tokio::test]
async fn missing_dependency_fails_its_package() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0").dependency("Ghost", Some("1.0.0")));

    let manager = host.manager(host.settings(&[&feed], &["DemoPlugin"]));
    let err = manager.load_extension_packages().await.unwrap_err();

    assert!(matches!(err, Error::Incomplete { failed: 1, total: 1 }));
    host.dirs.assert_not_exists("plugins/DemoPlugin.1.0.0");
    assert_eq!(host.services.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn pending_packages_fall_through_to_later_feeds() {
    let host = Host::new();
    let empty = TestFeed::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0"));

    let manager = host.manager(host.settings(&[&empty, &feed], &["DemoPlugin"]));
    manager.load_extension_packages().await.unwrap();

    assert_eq!(manager.extension_package_modules().len(), 1);
    assert_eq!(host.services.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn partial_failure_keeps_what_loaded() {
    let host = Host::new();
    let feed = TestFeed::new();
    feed.publish(&demo("1.0.0"));

    let manager = host.manager(host.settings(&[&feed], &["DemoPlugin", "Absent"]));
    let err = manager.load_extension_packages().await.unwrap_err();

    assert!(matches!(err, Error::Incomplete { failed: 1, total: 2 }));
    assert_eq!(err.to_string(), "Unable to download 1 packages out of 2.");
    assert_eq!(manager.extension_package_modules().len(), 1);
    host.dirs.assert_exists("plugins/DemoPlugin.1.0.0");
}
