use std::{sync::Arc, time::Duration};

use isotone_config::Timeouts;
use isotone_types::{Category, Operation, Phase, ServiceCommand, ServiceDescriptor};

use crate::{
    install::InstallStatus,
    registry::ServiceRegistry,
    testing::{MockInstallAction, MockServiceControl},
    Error,
};

use super::ServiceOrchestrator;

struct Harness {
    control: Arc<MockServiceControl>,
    action: Arc<MockInstallAction>,
    orchestrator: Arc<ServiceOrchestrator>,
}

/// web, db and mail, each as `(installed, running)`.
fn harness(web: (bool, bool), db: (bool, bool), mail: (bool, bool)) -> Harness {
    let control = Arc::new(
        MockServiceControl::new()
            .with_unit("web", web.0, web.1)
            .with_unit("db", db.0, db.1)
            .with_unit("mail", mail.0, mail.1),
    );
    let action = Arc::new(MockInstallAction::new(control.clone()));
    let registry = ServiceRegistry::new([
        ServiceDescriptor::new("web", Category::Web).with_ports([80, 443]),
        ServiceDescriptor::new("db", Category::Database).with_ports([3306]),
        ServiceDescriptor::new("mail", Category::Mail).with_ports([1025, 8025]),
    ])
    .unwrap();

    let orchestrator = ServiceOrchestrator::builder(registry, control.clone())
        .install_action(action.clone())
        .timeouts(Timeouts {
            start: Duration::from_secs(5),
            stop: Duration::from_secs(5),
            probe: Duration::from_secs(1),
            install: Duration::from_secs(10),
        })
        .publisher_capacity(32)
        .build();

    Harness {
        control,
        action,
        orchestrator: Arc::new(orchestrator),
    }
}

fn phase(orchestrator: &ServiceOrchestrator, name: &str) -> Phase {
    orchestrator.get_state(name).unwrap().phase
}

#[tokio::test]
async fn test_states_are_unknown_before_first_refresh() {
    let h = harness((true, true), (true, false), (false, false));
    let states = h.orchestrator.get_all_states();

    assert_eq!(states.len(), 3);
    for snapshot in states.iter() {
        assert_eq!(snapshot.state.phase, Phase::Unknown, "{}", snapshot.descriptor.name);
        assert_eq!(snapshot.in_flight, None);
    }
    assert_eq!(h.control.probe_calls("web"), 0);
}

#[tokio::test]
async fn test_refresh_resolves_ground_truth() {
    let h = harness((true, true), (true, false), (false, false));

    let report = h.orchestrator.refresh().await;

    assert_eq!(report.changed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Running);
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Stopped);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::NotInstalled);

    let web = h.orchestrator.get_state("web").unwrap();
    assert!(web.is_installed);
    assert!(web.can_stop());
    assert!(!h.orchestrator.get_state("mail").unwrap().is_installed);

    // nothing changed, nothing published
    let again = h.orchestrator.refresh().await;
    assert_eq!(again.changed, 0);
}

#[tokio::test]
async fn test_unknown_service_is_rejected() {
    let h = harness((true, true), (true, true), (true, true));
    assert!(matches!(
        h.orchestrator.start("ftp").await,
        Err(Error::UnknownService(name)) if name == "ftp"
    ));
    assert!(matches!(
        h.orchestrator.get_state("ftp"),
        Err(Error::UnknownService(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_fails_fast() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;
    h.control.delay_start("web", Duration::from_secs(1));

    let (first, second) = tokio::join!(h.orchestrator.start("web"), h.orchestrator.start("web"));

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(Error::OperationInProgress {
            operation: Operation::Start,
            ..
        })
    ));
    assert_eq!(h.control.start_calls("web"), 1);
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Running);
}

#[tokio::test(start_paused = true)]
async fn test_transient_phase_is_visible_and_published() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;
    let mut sub = h.orchestrator.subscribe();
    h.control.delay_start("db", Duration::from_secs(2));

    let task = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.start("db").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(phase(&h.orchestrator, "db"), Phase::Starting);
    assert_eq!(h.orchestrator.in_flight("db").unwrap(), Some(Operation::Start));
    assert!(!h.orchestrator.get_state("db").unwrap().can_start());

    task.await.unwrap().unwrap();

    let first = sub.recv().await.unwrap();
    assert_eq!(first.service, "db");
    assert_eq!(first.previous.phase, Phase::Stopped);
    assert_eq!(first.current.phase, Phase::Starting);
    let second = sub.recv().await.unwrap();
    assert_eq!(second.previous.phase, Phase::Starting);
    assert_eq!(second.current.phase, Phase::Running);
    assert_eq!(h.orchestrator.in_flight("db").unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_releases_guard() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    h.control.hang_stop("db");

    let err = h.orchestrator.stop("db").await.unwrap_err();
    assert!(err.is_timeout());

    let state = h.orchestrator.get_state("db").unwrap();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.last_error.unwrap().contains("timed out"));

    h.control.clear_failures("db");
    h.orchestrator.start("db").await.unwrap();
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Running);
    assert_eq!(h.orchestrator.get_state("db").unwrap().last_error, None);
}

#[tokio::test]
async fn test_restart_does_not_start_after_failed_stop() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    h.control.fail_stop("web", "access denied");

    let err = h.orchestrator.restart("web").await.unwrap_err();

    assert!(matches!(err, Error::ControlPort { action: "stop", .. }));
    assert_eq!(h.control.start_calls("web"), 0);
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Error);
}

#[tokio::test]
async fn test_restart_stops_then_starts() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    let mut sub = h.orchestrator.subscribe();

    h.orchestrator.restart("web").await.unwrap();

    assert_eq!(h.control.stop_calls("web"), 1);
    assert_eq!(h.control.start_calls("web"), 1);
    let phases: Vec<_> = std::iter::from_fn(|| sub.try_recv())
        .map(|c| c.current.phase)
        .collect();
    assert_eq!(phases, vec![Phase::Restarting, Phase::Running]);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skips_service_in_flight() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;
    h.control.delay_start("mail", Duration::from_secs(2));

    let task = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.start("mail").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = h.orchestrator.refresh().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::Starting);

    task.await.unwrap().unwrap();
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::Running);

    h.control.set_running("mail", false);
    let report = h.orchestrator.refresh().await;
    assert_eq!(report.skipped, 0);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::Stopped);
}

#[tokio::test]
async fn test_probe_failure_flips_to_error() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    h.control.fail_probe("web", "rpc unavailable");

    let report = h.orchestrator.refresh().await;

    assert_eq!(report.failed, 1);
    let web = h.orchestrator.get_state("web").unwrap();
    assert_eq!(web.phase, Phase::Error);
    assert!(web.is_installed);
    assert!(web.last_error.unwrap().contains("rpc unavailable"));
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Running);

    h.control.clear_failures("web");
    h.orchestrator.refresh().await;
    let web = h.orchestrator.get_state("web").unwrap();
    assert_eq!(web.phase, Phase::Running);
    assert_eq!(web.last_error, None);
}

#[tokio::test]
async fn test_command_for_not_installed_service_is_rejected() {
    let h = harness((true, true), (true, true), (false, false));
    h.orchestrator.refresh().await;

    let err = h.orchestrator.start("mail").await.unwrap_err();

    assert!(matches!(err, Error::NotInstalled(_)));
    assert_eq!(h.control.start_calls("mail"), 0);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::NotInstalled);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_command_releases_guard() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;
    h.control.hang_start("web");

    let result = tokio::time::timeout(Duration::from_millis(100), h.orchestrator.start("web")).await;
    assert!(result.is_err());

    let state = h.orchestrator.get_state("web").unwrap();
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.last_error.as_deref(), Some("operation cancelled"));
    assert_eq!(h.orchestrator.in_flight("web").unwrap(), None);
}

#[tokio::test]
async fn test_install_without_effect_fails() {
    let h = harness((true, true), (true, true), (false, false));
    h.orchestrator.refresh().await;
    h.action.set_effective(false);

    let err = h.orchestrator.install("mail").await.unwrap_err();

    assert!(matches!(
        err,
        Error::InstallNoEffect {
            operation: Operation::Install,
            installed: false,
            ..
        }
    ));
    let mail = h.orchestrator.get_state("mail").unwrap();
    assert!(!mail.is_installed);
    assert_eq!(mail.phase, Phase::NotInstalled);
    assert!(mail.last_error.unwrap().contains("had no effect"));
    assert!(matches!(
        h.orchestrator.install_status("mail").unwrap(),
        InstallStatus::Failed { .. }
    ));

    let err = h.orchestrator.start("mail").await.unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));
    assert_eq!(h.control.start_calls("mail"), 0);
}

#[tokio::test]
async fn test_install_on_installed_service_is_rejected() {
    let h = harness((true, true), (true, true), (false, false));
    h.orchestrator.refresh().await;
    let mut events = h.orchestrator.subscribe();

    let err = h.orchestrator.install("web").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInstalled(_)));

    let err = h.orchestrator.uninstall("mail").await.unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));

    assert_eq!(h.action.calls(), 0);
    let web = h.orchestrator.get_state("web").unwrap();
    assert_eq!(web.phase, Phase::Running);
    assert_eq!(web.last_error, None);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::NotInstalled);
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn test_failed_uninstall_keeps_observed_phase() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    h.action.fail("script not found");

    let err = h.orchestrator.uninstall("mail").await.unwrap_err();

    assert!(matches!(
        err,
        Error::ActionFailed {
            operation: Operation::Uninstall,
            ..
        }
    ));
    let mail = h.orchestrator.get_state("mail").unwrap();
    assert_eq!(mail.phase, Phase::Running);
    assert!(mail.is_installed);
    assert!(mail.last_error.unwrap().contains("script not found"));
    assert_eq!(h.orchestrator.in_flight("mail").unwrap(), None);
}

#[tokio::test]
async fn test_install_with_unreachable_service_manager_is_error() {
    let h = harness((true, true), (true, true), (false, false));
    h.orchestrator.refresh().await;
    h.control.fail_probe("mail", "rpc unavailable");

    let err = h.orchestrator.install("mail").await.unwrap_err();

    assert!(matches!(err, Error::ControlPort { .. }));
    let mail = h.orchestrator.get_state("mail").unwrap();
    assert_eq!(mail.phase, Phase::Error);
    assert!(!mail.is_installed);
    assert_eq!(h.action.calls(), 0);
}

#[tokio::test]
async fn test_uninstall_moves_to_not_installed() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;

    h.orchestrator.uninstall("db").await.unwrap();

    let db = h.orchestrator.get_state("db").unwrap();
    assert_eq!(db.phase, Phase::NotInstalled);
    assert!(!db.is_installed);
    assert!(!h.control.installed("db"));
}

#[tokio::test]
async fn test_stop_all_collects_failures() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    h.control.fail_stop("db", "access denied");

    let err = h.orchestrator.stop_all().await.unwrap_err();

    let Error::Aggregate(aggregate) = err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(aggregate.operation, Operation::Stop);
    assert_eq!(aggregate.services().collect::<Vec<_>>(), vec!["db"]);
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Stopped);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::Stopped);
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Error);
}

#[tokio::test]
async fn test_all_operations_pick_their_targets() {
    let h = harness((true, false), (false, false), (false, false));
    h.orchestrator.refresh().await;

    h.orchestrator.start_all().await.unwrap();
    assert_eq!(h.control.start_calls("db"), 0);
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Running);

    h.orchestrator.install_all().await.unwrap();
    assert_eq!(h.action.calls(), 2);
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Stopped);
    assert_eq!(phase(&h.orchestrator, "mail"), Phase::Stopped);
}

#[tokio::test]
async fn test_execute_dispatches_commands() {
    let h = harness((true, false), (true, false), (true, false));
    h.orchestrator.refresh().await;

    let command: ServiceCommand = "start all".parse().unwrap();
    h.orchestrator.execute(&command).await.unwrap();
    assert_eq!(h.orchestrator.aggregate().count(Phase::Running), 3);

    let command: ServiceCommand = "stop web".parse().unwrap();
    h.orchestrator.execute(&command).await.unwrap();
    assert_eq!(phase(&h.orchestrator, "web"), Phase::Stopped);
    assert_eq!(phase(&h.orchestrator, "db"), Phase::Running);
}

#[tokio::test]
async fn test_uptime_survives_refresh() {
    let h = harness((true, true), (true, true), (true, true));
    h.orchestrator.refresh().await;
    let before = h.orchestrator.get_state("web").unwrap().last_transition_at;

    h.orchestrator.refresh().await;

    assert_eq!(
        h.orchestrator.get_state("web").unwrap().last_transition_at,
        before
    );
}
