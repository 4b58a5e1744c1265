use std::{sync::Arc, time::Duration};

use isotone_config::Config;
use isotone_core::{
    testing::{MockInstallAction, MockServiceControl},
    InstallStatus, InstallVerb, ServiceOrchestrator, ServiceRegistry, StatusPoller,
};
use isotone_types::{Phase, StateChange};
use tokio_util::sync::CancellationToken;

/// The default catalog with nothing installed yet.
fn stack() -> (Arc<MockServiceControl>, Arc<ServiceOrchestrator>) {
    let config = Config::default();
    let control = Arc::new(MockServiceControl::new());
    let action = Arc::new(MockInstallAction::new(control.clone()));
    let registry = ServiceRegistry::from_config(&config).unwrap();

    let orchestrator = ServiceOrchestrator::builder(registry, control.clone())
        .install_action(action)
        .timeouts(config.timeouts)
        .publisher_capacity(config.publisher_capacity)
        .build();
    (control, Arc::new(orchestrator))
}

#[tokio::test]
async fn test_install_then_start_web() {
    let (control, orchestrator) = stack();

    orchestrator.refresh().await;
    assert_eq!(orchestrator.aggregate().count(Phase::NotInstalled), 3);

    orchestrator.install("web").await.unwrap();
    assert_eq!(orchestrator.get_state("web").unwrap().phase, Phase::Stopped);
    assert!(control.installed("IsotoneApache"));
    assert_eq!(
        orchestrator.install_status("web").unwrap(),
        InstallStatus::Completed(InstallVerb::Install)
    );

    orchestrator.start("web").await.unwrap();

    let states = orchestrator.get_all_states();
    let phases: Vec<_> = states
        .iter()
        .map(|s| (s.descriptor.name.as_str(), s.state.phase))
        .collect();
    assert_eq!(
        phases,
        vec![
            ("web", Phase::Running),
            ("db", Phase::NotInstalled),
            ("mail", Phase::NotInstalled),
        ]
    );

    let aggregate = orchestrator.aggregate();
    assert_eq!(aggregate.count(Phase::Running), 1);
    assert_eq!(aggregate.count(Phase::NotInstalled), 2);
    assert_eq!(aggregate.total(), 3);
    assert_eq!(aggregate.to_string(), "2 not installed, 1 running");
}

#[tokio::test]
async fn test_status_report_json() {
    let (_control, orchestrator) = stack();
    orchestrator.refresh().await;
    orchestrator.install("db").await.unwrap();
    orchestrator.start("db").await.unwrap();

    let report = orchestrator.status_report();
    let json = serde_json::to_value(&report).unwrap();

    let db = &json["services"][1];
    assert_eq!(db["name"], "db");
    assert_eq!(db["phase"], "Running");
    assert_eq!(db["isInstalled"], true);
    assert_eq!(db["ports"], serde_json::json!([3306]));
    assert!(db["uptimeSeconds"].is_u64());
    assert_eq!(json["services"][0]["uptimeSeconds"], serde_json::Value::Null);
    assert_eq!(json["aggregate"]["NotInstalled"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_poller_feeds_observers() {
    let (control, orchestrator) = stack();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<StateChange>();
    orchestrator
        .publisher()
        .subscribe_observer(Arc::new(move |change: &StateChange| {
            let _ = tx.send(change.clone());
        }));

    let cancel = CancellationToken::new();
    let poller = StatusPoller::new(Duration::from_secs(2)).spawn(orchestrator.clone(), cancel);

    for _ in 0..3 {
        let change = rx.recv().await.unwrap();
        assert_eq!(change.previous.phase, Phase::Unknown);
        assert_eq!(change.current.phase, Phase::NotInstalled);
    }

    // installed behind the orchestrator's back; the next tick notices
    control.set_installed("IsotoneMailpit", true);
    control.set_running("IsotoneMailpit", true);
    let change = rx.recv().await.unwrap();
    assert_eq!(change.service, "mail");
    assert_eq!(change.current.phase, Phase::Running);
    assert!(change.current.is_installed);

    poller.shutdown().await;
}
