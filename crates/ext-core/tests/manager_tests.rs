//! Extension manager lifecycle against a local feed.

use std::io::Write;
use std::sync::{Arc, Mutex};

use ext_core::{
    BuiltinModuleLoader, Error, ExtensionManager, ExtensionManagerSettings, ExtensionPackage,
    ExtensionSource, MANAGER_SERVICE, ModuleLoader, ModuleState, add_extensions,
};
use ext_packages::{RetryPolicy, TargetMonikers};
use ext_plugin::{
    ConfigureArgs, Configuration, ServiceCollection, ServiceRegistry, SharedList, TextCallback,
};
use ext_test_utils::{PackageBuilder, TestFeed, TestHost};
use futures::StreamExt;
use pretty_assertions::assert_eq;

struct Fixture {
    host: TestHost,
    feed: TestFeed,
    services: Arc<Mutex<ServiceCollection>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            host: TestHost::new(),
            feed: TestFeed::new(),
            services: Arc::new(Mutex::new(ServiceCollection::new())),
        }
    }

    fn settings(&self, packages: &[&str]) -> ExtensionManagerSettings {
        ExtensionManagerSettings {
            sources: vec![ExtensionSource::new(self.feed.uri())],
            packages: packages.iter().map(|p| p.to_string()).collect(),
            ..ExtensionManagerSettings::rooted_at(self.host.root())
        }
    }

    fn manager(&self, settings: ExtensionManagerSettings) -> ExtensionManager {
        let registry: Arc<Mutex<dyn ServiceRegistry>> = self.services.clone();
        let loader: Arc<dyn ModuleLoader> = Arc::new(
            BuiltinModuleLoader::new().register("demo_plugin", demo_plugin::declaration()),
        );
        ExtensionManager::builder(settings)
            .registry(registry)
            .module_loader(loader)
            .retry_policy(RetryPolicy::immediate(2))
            .targets(TargetMonikers::new(["any"]))
            .build()
            .unwrap()
    }

    fn service_count(&self) -> usize {
        self.services.lock().unwrap().len()
    }
}

fn demo(version: &str) -> PackageBuilder {
    PackageBuilder::new("DemoPlugin", version).module("any", "demo_plugin")
}

fn isolated(mut settings: ExtensionManagerSettings) -> ExtensionManagerSettings {
    settings.ignore_schedule = true;
    settings.ignore_installed_extension_packages = true;
    settings
}

#[tokio::test]
async fn loads_and_activates_configured_package() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let manager = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    manager.load_extension_packages().await.unwrap();

    assert_eq!(fixture.service_count(), 1);
    let modules = manager.extension_package_modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name, "demo_plugin");
    assert_eq!(
        manager.module_states(),
        vec![("demo_plugin".to_string(), ModuleState::ServicesConfigured)]
    );
    fixture.host.assert_exists("plugins/DemoPlugin.1.0.0");
    fixture.host.assert_exists("cache/DemoPlugin.1.0.0.nupkg");
}

#[tokio::test]
async fn initialize_false_loads_without_activating() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let mut settings = isolated(fixture.settings(&["DemoPlugin"]));
    settings.initialize = false;
    let manager = fixture.manager(settings);
    manager.load_extension_packages().await.unwrap();

    assert_eq!(fixture.service_count(), 0);
    assert_eq!(manager.extension_package_modules().len(), 1);
    assert_eq!(
        manager.module_states(),
        vec![("demo_plugin".to_string(), ModuleState::Loaded)]
    );
}

#[tokio::test]
async fn pinned_version_missing_everywhere_fails_the_load() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let manager = fixture.manager(isolated(fixture.settings(&["DemoPlugin:9.9.9"])));
    let err = manager.load_extension_packages().await.unwrap_err();

    assert!(matches!(err, Error::Incomplete { failed: 1, total: 1 }));
    assert_eq!(err.to_string(), "Unable to download 1 packages out of 1.");
    assert_eq!(fixture.service_count(), 0);
}

#[tokio::test]
async fn unusable_source_is_skipped() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let mut settings = isolated(fixture.settings(&["DemoPlugin"]));
    settings
        .sources
        .insert(0, ExtensionSource::new("https://feed.invalid/v3"));
    let manager = fixture.manager(settings);
    manager.load_extension_packages().await.unwrap();

    assert_eq!(manager.extension_package_modules().len(), 1);
}

#[tokio::test]
async fn latest_version_and_dependencies_are_materialized() {
    let fixture = Fixture::new();
    fixture.feed.publish(&PackageBuilder::new("Helper", "1.0.0"));
    fixture.feed.publish(&PackageBuilder::new("Helper", "2.0.0"));
    fixture.feed.publish(&demo("1.0.0"));
    fixture
        .feed
        .publish(&demo("1.2.0").dependency("Helper", Some("1.0.0")));

    let manager = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    manager.load_extension_packages().await.unwrap();

    fixture.host.assert_exists("plugins/DemoPlugin.1.2.0");
    fixture.host.assert_not_exists("plugins/DemoPlugin.1.0.0");
    fixture.host.assert_exists("lib/Helper.1.0.0");
    fixture.host.assert_not_exists("lib/Helper.2.0.0");
}

#[tokio::test]
async fn installed_package_is_reused_without_feed() {
    let fixture = Fixture::new();
    let archive = fixture.feed.publish(&demo("1.0.0"));

    let first = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    first.load_extension_packages().await.unwrap();
    drop(first);

    std::fs::remove_file(&archive).unwrap();
    assert_eq!(fixture.feed.archive_count(), 0);

    let mut settings = fixture.settings(&["DemoPlugin"]);
    settings.ignore_schedule = true;
    let second = fixture.manager(settings);
    second.load_extension_packages().await.unwrap();

    assert_eq!(second.extension_package_modules().len(), 1);
    let installed = second.installed_packages().await;
    assert_eq!(installed.get("demoplugin").unwrap().version.to_string(), "1.0.0");
}

#[tokio::test]
async fn pinned_package_is_satisfied_by_any_installed_version() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));
    fixture.feed.publish(&demo("2.0.0"));

    let first = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    first.load_extension_packages().await.unwrap();
    drop(first);
    fixture.host.assert_exists("plugins/DemoPlugin.2.0.0");

    for _ in 0..2 {
        let mut settings = fixture.settings(&["DemoPlugin:1.0.0"]);
        settings.ignore_schedule = true;
        let manager = fixture.manager(settings);
        manager.load_extension_packages().await.unwrap();

        fixture.host.assert_not_exists("plugins/DemoPlugin.1.0.0");
        let modules = manager.extension_package_modules();
        assert_eq!(modules.len(), 1);
        let package = modules[0].package.as_ref().unwrap();
        assert_eq!(package.version.to_string(), "2.0.0");
        let installed = manager.installed_packages().await;
        assert_eq!(installed.get("DemoPlugin").unwrap().version.to_string(), "2.0.0");
    }
}

#[tokio::test]
async fn scheduled_install_is_applied_and_cleared() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));
    fixture.feed.publish(&demo("2.0.0"));

    let manager = fixture.manager(fixture.settings(&[]));
    manager
        .schedule_install_extension_package("DemoPlugin", Some("1.0.0"))
        .await
        .unwrap();
    assert_eq!(
        manager
            .is_extension_package_scheduled_to_install("DemoPlugin")
            .await
            .unwrap(),
        (true, "1.0.0".to_string())
    );

    manager.load_extension_packages().await.unwrap();

    fixture.host.assert_exists("plugins/DemoPlugin.1.0.0");
    fixture.host.assert_not_exists("plugins/schedule.json");
    assert!(manager.schedule().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_load_keeps_schedule() {
    let fixture = Fixture::new();

    let manager = fixture.manager(fixture.settings(&[]));
    manager
        .schedule_install_extension_package("Missing", None)
        .await
        .unwrap();

    let err = manager.load_extension_packages().await.unwrap_err();
    assert!(matches!(err, Error::Incomplete { failed: 1, total: 1 }));
    assert_eq!(
        manager.schedule().await.unwrap().install,
        vec!["Missing".to_string()]
    );
}

#[tokio::test]
async fn scheduled_uninstall_removes_installed_directories() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let first = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    first.load_extension_packages().await.unwrap();
    fixture.host.assert_exists("plugins/DemoPlugin.1.0.0");
    drop(first);

    let second = fixture.manager(fixture.settings(&[]));
    second
        .schedule_uninstall_extension_package("DemoPlugin")
        .await
        .unwrap();
    assert!(
        second
            .is_extension_package_scheduled_to_uninstall("DemoPlugin")
            .await
            .unwrap()
    );
    second.load_extension_packages().await.unwrap();

    fixture.host.assert_not_exists("plugins/DemoPlugin.1.0.0");
    assert!(second.extension_package_modules().is_empty());
    assert!(second.installed_packages().await.is_empty());
}

#[tokio::test]
async fn browsing_hides_blacklisted_versions() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));
    fixture.feed.publish(&demo("1.1.0"));
    fixture
        .feed
        .publish(&PackageBuilder::new("Internal.Tool", "1.0.0"));

    let mut settings = isolated(fixture.settings(&["DemoPlugin:1.0.0", "Internal.Tool"]));
    settings.blacklist = vec!["^internal\\.".to_string()];
    let manager = fixture.manager(settings);
    manager.load_extension_packages().await.unwrap();

    let packages: Vec<ExtensionPackage> = manager
        .available_extension_packages(0, 50)
        .collect()
        .await;
    assert_eq!(packages.len(), 2);

    let demo = packages.iter().find(|p| p.id == "DemoPlugin").unwrap();
    let versions: Vec<String> = demo
        .versions
        .as_ref()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(versions, vec!["1.0.0", "1.1.0"]);
    assert_eq!(demo.installed_version.as_ref().unwrap().to_string(), "1.0.0");
    assert!(demo.has_update());

    let internal = packages.iter().find(|p| p.id == "Internal.Tool").unwrap();
    assert_eq!(internal.versions, None);
    assert!(internal.is_installed());
}

#[tokio::test]
async fn package_by_id_uses_first_searchable_source() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let manager = fixture.manager(fixture.settings(&[]));
    let package = manager.extension_package_by_id("DemoPlugin").await.unwrap();
    assert_eq!(package.versions.map(|v| v.len()), Some(1));
    assert_eq!(package.installed_version, None);

    assert_eq!(manager.extension_package_by_id("Nope").await, None);

    let mut hidden = fixture.settings(&[]);
    hidden.sources = vec![ExtensionSource::new(fixture.feed.uri()).searchable(false)];
    let manager = fixture.manager(hidden);
    assert_eq!(manager.extension_package_by_id("DemoPlugin").await, None);
}

#[tokio::test]
async fn configure_reaches_plugins_by_arity() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));

    let manager = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    manager.load_extension_packages().await.unwrap();

    let list = SharedList::new();
    let messages = SharedList::new();
    let sink = messages.clone();
    let callback = TextCallback::new(move |text| sink.push(text));

    assert_eq!(manager.configure(&ConfigureArgs::new().with(callback.clone())), 0);
    assert!(list.is_empty());

    let handled = manager.configure(&ConfigureArgs::new().with(callback).with(list.clone()));
    assert_eq!(handled, 1);
    assert_eq!(list.snapshot(), vec!["DemoPlugin".to_string()]);
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn reset_removes_managed_directories() {
    let fixture = Fixture::new();
    fixture.feed.publish(&demo("1.0.0"));
    fixture
        .feed
        .publish(&PackageBuilder::new("Helper", "1.0.0"));

    let manager = fixture.manager(isolated(fixture.settings(&["DemoPlugin"])));
    manager.load_extension_packages().await.unwrap();
    fixture.host.assert_exists("plugins");
    fixture.host.assert_exists("cache");

    manager.reset().await;

    fixture.host.assert_not_exists("plugins");
    fixture.host.assert_not_exists("lib");
    fixture.host.assert_not_exists("cache");
}

#[tokio::test]
async fn add_extensions_registers_the_manager() {
    let host = TestHost::new();
    let feed = TestFeed::new();
    let configuration = Configuration::new(serde_json::json!({
        "Extensions": {
            "PluginsDirectory": host.plugins_dir(),
            "PluginsDependenciesDirectory": host.dependencies_dir(),
            "CacheDirectory": host.cache_dir(),
            "Sources": [feed.uri()]
        }
    }));

    let services = Arc::new(Mutex::new(ServiceCollection::new()));
    let registry: Arc<Mutex<dyn ServiceRegistry>> = services.clone();
    let manager = add_extensions(registry, configuration).await.unwrap();

    let services = services.lock().unwrap();
    let registered = services
        .get_as::<Arc<ExtensionManager>>(MANAGER_SERVICE)
        .unwrap();
    assert!(Arc::ptr_eq(registered, &manager));
    assert!(manager.extension_package_modules().is_empty());
    host.assert_exists("plugins");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn plugins_directory_creation_is_logged_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let fixture = Fixture::new();
    let manager = fixture.manager(isolated(fixture.settings(&[])));
    manager.load_extension_packages().await.unwrap();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let creating = output
        .lines()
        .filter(|line| line.contains("Creating") && line.contains("plugins"))
        .count();
    assert_eq!(creating, 1, "{output}");
    fixture.host.assert_exists("plugins");
}
