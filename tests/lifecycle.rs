mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use vmwatch::{InstanceIdentity, MetricCatalog, MonitorController, MonitorStatus, RawResponse};

fn controller(backend: ScriptedBackend) -> (MonitorController, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let controller = MonitorController::new(backend.clone(), Arc::new(MetricCatalog::builtin()));
    (controller, backend)
}

#[tokio::test]
async fn failing_probe_reports_backend_unavailable() {
    let (controller, backend) = controller(ScriptedBackend::new().fail(&probe_query("abc")));

    controller.reinitialize(&InstanceIdentity::new("abc"));
    let state = controller.wait_settled().await;

    assert_eq!(state.status, MonitorStatus::Error);
    assert!(!state.backend_available);
    assert!(state
        .error_message
        .as_deref()
        .is_some_and(|msg| msg.contains("connection refused")));
    assert!(!backend.was_asked(&info_query("abc")));
}

#[tokio::test]
async fn missing_instance_id_never_queries() {
    let (controller, backend) = controller(ScriptedBackend::new());

    controller.reinitialize(&InstanceIdentity::default());
    let state = controller.wait_settled().await;

    assert!(state.is_error());
    assert!(state.backend_available);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Instance ID is required for monitoring")
    );
    assert!(backend.seen().is_empty());
}

#[tokio::test]
async fn empty_resolution_falls_back_to_instance_id() {
    let (controller, _) = controller(
        ScriptedBackend::new()
            .answer(&probe_query("abc"), one_value())
            .answer(&info_query("abc"), RawResponse::empty()),
    );

    controller.reinitialize(&InstanceIdentity::new("abc"));
    let state = controller.wait_settled().await;

    assert!(state.is_ready());
    assert_eq!(state.domain.as_deref(), Some("abc"));
    assert!(state.advisory().is_some());
}

#[tokio::test]
async fn route_id_is_used_without_explicit_id() {
    let (controller, _) = controller(
        ScriptedBackend::new()
            .answer(&probe_query("from-route"), one_value())
            .answer(&info_query("from-route"), openstack_info("from-route", "instance-00000001")),
    );

    controller.reinitialize(&InstanceIdentity::default().with_route_id("from-route"));
    let state = controller.wait_settled().await;

    assert_eq!(state.instance_id.as_deref(), Some("from-route"));
    assert_eq!(state.domain.as_deref(), Some("instance-00000001"));
}

#[tokio::test(start_paused = true)]
async fn last_reinitialize_wins() {
    let (controller, _) = controller(
        ScriptedBackend::new()
            .answer(&probe_query("abc"), one_value())
            .answer_after(
                &info_query("abc"),
                Duration::from_secs(5),
                openstack_info("abc", "instance-000000ab"),
            )
            .answer(&probe_query("xyz"), one_value())
            .answer(&info_query("xyz"), openstack_info("xyz", "instance-000000ff")),
    );
    let mut rx = controller.subscribe();

    controller.reinitialize(&InstanceIdentity::new("abc"));
    // let the abc task reach its slow resolution query
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.reinitialize(&InstanceIdentity::new("xyz"));

    let state = controller.wait_settled().await;
    assert_eq!(state.domain.as_deref(), Some("instance-000000ff"));
    rx.borrow_and_update();

    // well past the abc delay, nothing else is published
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(controller.state().domain.as_deref(), Some("instance-000000ff"));
}

#[tokio::test]
async fn back_to_back_reinitialize_only_runs_the_last() {
    let (controller, backend) = controller(
        ScriptedBackend::new()
            .answer(&probe_query("xyz"), one_value())
            .answer(&info_query("xyz"), openstack_info("xyz", "instance-000000ff")),
    );

    controller.reinitialize(&InstanceIdentity::new("abc"));
    controller.reinitialize(&InstanceIdentity::new("xyz"));
    let state = controller.wait_settled().await;

    assert_eq!(state.domain.as_deref(), Some("instance-000000ff"));
    assert!(!backend.was_asked(&probe_query("abc")));
}

#[tokio::test]
async fn detail_revision_triggers_reload() {
    let (controller, backend) = controller(
        ScriptedBackend::new()
            .answer(&probe_query("abc"), one_value())
            .answer(&info_query("abc"), openstack_info("abc", "instance-000000ab")),
    );
    let identity = InstanceIdentity::new("abc");

    assert!(controller.update_identity(&identity));
    controller.wait_settled().await;
    assert!(!controller.update_identity(&identity));
    assert!(controller.update_identity(&identity.clone().with_revision(2)));
    controller.wait_settled().await;

    let probes = backend
        .seen()
        .iter()
        .filter(|(q, _)| *q == probe_query("abc"))
        .count();
    assert_eq!(probes, 2);
}
