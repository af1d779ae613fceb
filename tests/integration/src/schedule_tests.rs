//! Install schedule properties observed through the manager.

use ext_core::{ExtensionManager, ExtensionManagerSettings, Schedule};
use ext_test_utils::TestHost;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn manager(host: &TestHost) -> ExtensionManager {
    ExtensionManager::builder(ExtensionManagerSettings::rooted_at(host.root()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn unscheduled_ids_report_nothing() {
    let host = TestHost::new();
    let manager = manager(&host);

    assert_eq!(
        manager
            .is_extension_package_scheduled_to_install("Never")
            .await
            .unwrap(),
        (false, String::new())
    );
    assert!(
        !manager
            .is_extension_package_scheduled_to_uninstall("Never")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn install_then_uninstall_keeps_sets_disjoint() {
    let host = TestHost::new();
    let manager = manager(&host);

    manager
        .schedule_install_extension_package("A", Some("1.0.0"))
        .await
        .unwrap();
    manager.schedule_uninstall_extension_package("A").await.unwrap();

    let schedule = manager.schedule().await.unwrap();
    assert!(schedule.install.is_empty());
    assert_eq!(schedule.uninstall, vec!["A".to_string()]);

    manager
        .schedule_install_extension_package("A", None)
        .await
        .unwrap();
    let schedule = manager.schedule().await.unwrap();
    assert_eq!(schedule.install, vec!["A".to_string()]);
    assert!(schedule.uninstall.is_empty());
}

#[tokio::test]
async fn reinstall_replaces_pinned_version() {
    let host = TestHost::new();
    let manager = manager(&host);

    manager
        .schedule_install_extension_package("A", Some("1.0.0"))
        .await
        .unwrap();
    manager
        .schedule_install_extension_package("A", Some("1.0.1"))
        .await
        .unwrap();

    let schedule = manager.schedule().await.unwrap();
    assert_eq!(schedule.install, vec!["A:1.0.1".to_string()]);
    assert_eq!(
        manager
            .is_extension_package_scheduled_to_install("A")
            .await
            .unwrap(),
        (true, "1.0.1".to_string())
    );
}

#[tokio::test]
async fn uninstall_is_idempotent() {
    let host = TestHost::new();
    let manager = manager(&host);

    manager.schedule_uninstall_extension_package("A").await.unwrap();
    manager.schedule_uninstall_extension_package("A").await.unwrap();

    assert_eq!(
        manager.schedule().await.unwrap().uninstall,
        vec!["A".to_string()]
    );
}

#[rstest]
#[case::with_document(true)]
#[case::without_document(false)]
#[tokio::test]
async fn remove_leaves_empty_schedule(#[case] existing: bool) {
    let host = TestHost::new();
    let manager = manager(&host);
    if existing {
        manager
            .schedule_install_extension_package("A", None)
            .await
            .unwrap();
        host.assert_exists("plugins/schedule.json");
    }

    manager.remove_schedule().await.unwrap();

    assert_eq!(manager.schedule().await.unwrap(), Schedule::new());
    host.assert_not_exists("plugins/schedule.json");
}

#[tokio::test]
async fn corrupt_document_reads_as_empty() {
    let host = TestHost::new();
    std::fs::create_dir_all(host.plugins_dir()).unwrap();
    std::fs::write(host.plugins_dir().join("schedule.json"), "{ not json").unwrap();
    let manager = manager(&host);

    assert!(manager.schedule().await.unwrap().is_empty());

    manager
        .schedule_install_extension_package("A", None)
        .await
        .unwrap();
    assert_eq!(manager.schedule().await.unwrap().install, vec!["A".to_string()]);
}

#[tokio::test]
async fn legacy_uninstall_key_is_read() {
    let host = TestHost::new();
    std::fs::create_dir_all(host.plugins_dir()).unwrap();
    std::fs::write(
        host.plugins_dir().join("schedule.json"),
        r#"{"Install": ["B:2.0.0"], "UnInstall": ["A"]}"#,
    )
    .unwrap();
    let manager = manager(&host);

    assert!(
        manager
            .is_extension_package_scheduled_to_uninstall("A")
            .await
            .unwrap()
    );
    assert_eq!(
        manager
            .is_extension_package_scheduled_to_install("B")
            .await
            .unwrap(),
        (true, "2.0.0".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_are_not_lost() {
    let host = TestHost::new();
    let manager = manager(&host);

    let ids: Vec<String> = (0..16).map(|i| format!("Package{i}")).collect();
    futures::future::join_all(
        ids.iter()
            .map(|id| manager.schedule_install_extension_package(id, None)),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<()>, _>>()
    .unwrap();

    let mut install = manager.schedule().await.unwrap().install;
    install.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(install, expected);

    let written = std::fs::read_to_string(host.plugins_dir().join("schedule.json")).unwrap();
    assert!(written.contains("\n  \"Install\""));
}
