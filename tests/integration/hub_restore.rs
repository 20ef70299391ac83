//! Restore through the flow hub: routing, ordering, budgets and null snapshots

use super::test_utils::{order_endpoint, pairs, process_hub, recording_endpoint};
use ambience::flow::{EndpointBinding, NullSnapshotHandler, Snapshot};
use ambience::FlowError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_round_trip_routes_entries_back_to_their_endpoints() {
    let (_, hub) = process_hub();
    let (a, a_received) = recording_endpoint("A", &[("a1", "1"), ("a2", "2")]);
    let (b, b_received) = recording_endpoint("B", &[("b1", "3")]);
    let (root, root_received) = recording_endpoint("^Root", &[("g1", "4"), ("g2", "5")]);
    hub.bind_endpoint(a).unwrap();
    hub.bind_endpoint(b).unwrap();
    hub.bind_endpoint(root).unwrap();

    let mut snapshot = Snapshot::new();
    hub.capture_values_to(&mut snapshot, None).unwrap();
    assert_eq!(snapshot.len(), 5);

    hub.restore_values_from(Some(&snapshot), None).unwrap();

    assert_eq!(*a_received.lock(), vec![pairs(&[("a1", "1"), ("a2", "2")])]);
    assert_eq!(*b_received.lock(), vec![pairs(&[("b1", "3")])]);
    assert_eq!(*root_received.lock(), vec![pairs(&[("g1", "4"), ("g2", "5")])]);
}

#[test]
fn test_dedicated_prefix_matches_case_insensitively() {
    let (_, hub) = process_hub();
    let (a, a_received) = recording_endpoint("Alpha", &[]);
    let (root, root_received) = recording_endpoint("^Root", &[]);
    hub.bind_endpoint(a).unwrap();
    hub.bind_endpoint(root).unwrap();

    let mut snapshot = Snapshot::new();
    snapshot.insert("ALPHA.Key".to_string(), "v".to_string());
    snapshot.insert("alphabet".to_string(), "root".to_string());
    hub.restore_values_from(Some(&snapshot), None).unwrap();

    assert_eq!(*a_received.lock(), vec![pairs(&[("Key", "v")])]);
    assert_eq!(*root_received.lock(), vec![pairs(&[("alphabet", "root")])]);
}

#[test]
fn test_restore_order_honors_dependencies_regardless_of_bind_order() {
    let (_, hub) = process_hub();
    let log = Arc::new(Mutex::new(String::new()));

    hub.bind_endpoint(order_endpoint("E", 'e', &log)).unwrap();
    hub.bind_endpoint(order_endpoint("B", 'b', &log).restore_after(["A"]))
        .unwrap();
    hub.bind_endpoint(order_endpoint("A", 'a', &log)).unwrap();
    hub.bind_endpoint(order_endpoint("D", 'd', &log).restore_after(["A", "C"]))
        .unwrap();
    hub.bind_endpoint(order_endpoint("C", 'c', &log).restore_after(["A"]))
        .unwrap();
    hub.bind_endpoint(order_endpoint("F", 'f', &log)).unwrap();

    hub.restore_values_from(Some(&Snapshot::new()), None)
        .unwrap();

    let order = log.lock().clone();
    let position = |tag: char| order.find(tag).unwrap();
    assert!(position('a') < position('b'));
    assert!(position('a') < position('c'));
    assert!(position('a') < position('d'));
    assert!(position('c') < position('d'));
    assert_eq!(order, "abcdef");
}

#[test]
fn test_cyclic_restore_dependency_fails_bind() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[]).0.restore_after(["B"]))
        .unwrap();

    let err = hub
        .bind_endpoint(recording_endpoint("B", &[]).0.restore_after(["A"]))
        .unwrap_err();
    assert!(matches!(err, FlowError::CyclicDependency { .. }));
    assert!(!hub.endpoint_names().iter().any(|name| name == "B"));
}

#[test]
fn test_duplicate_endpoint_name_fails_bind() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("Tenant", &[]).0).unwrap();
    assert!(matches!(
        hub.bind_endpoint(recording_endpoint("TENANT", &[]).0),
        Err(FlowError::DuplicateEndpoint(_))
    ));
}

#[test]
fn test_slow_restore_reports_once_with_elapsed_time() {
    let (_, hub) = process_hub();
    let reports = Arc::new(Mutex::new(Vec::new()));
    {
        let reports = Arc::clone(&reports);
        hub.set_slow_restore_handler(Some(Arc::new(move |name: &str, elapsed_ms: u64| {
            reports.lock().push((name.to_string(), elapsed_ms));
        })));
    }

    hub.bind_endpoint(
        EndpointBinding::simple(
            "Sluggish",
            |_| Ok(()),
            |_| {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            },
        )
        .restore_budget_ms(100),
    )
    .unwrap();
    hub.bind_endpoint(
        EndpointBinding::simple(
            "Brisk",
            |_| Ok(()),
            |_| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(())
            },
        )
        .restore_budget_ms(300),
    )
    .unwrap();

    hub.restore_values_from(Some(&Snapshot::new()), None)
        .unwrap();

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "Sluggish");
    assert!(reports[0].1 >= 150);
}

#[test]
fn test_null_snapshot_fails_by_default() {
    let (_, hub) = process_hub();
    assert!(matches!(
        hub.restore_values_from(None, None),
        Err(FlowError::NullSnapshot)
    ));
}

#[test]
fn test_null_snapshot_substitute_versus_skip() {
    let (_, hub) = process_hub();
    let (a, a_received) = recording_endpoint("A", &[]);
    hub.bind_endpoint(a).unwrap();

    let substitute: NullSnapshotHandler = Arc::new(|| Ok(Snapshot::new()));
    hub.set_null_snapshot_handler(Some(substitute));
    hub.restore_values_from(None, None).unwrap();
    assert_eq!(*a_received.lock(), vec![Vec::new()]);

    hub.set_null_snapshot_handler(None);
    hub.restore_values_from(None, None).unwrap();
    assert_eq!(a_received.lock().len(), 1);
}

#[test]
fn test_restore_stops_at_first_failing_endpoint() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(EndpointBinding::simple(
        "First",
        |_| Ok(()),
        |_| Err(anyhow::anyhow!("rejected")),
    ))
    .unwrap();
    let (second, second_received) = recording_endpoint("Second", &[]);
    hub.bind_endpoint(second).unwrap();

    let err = hub
        .restore_values_from(Some(&Snapshot::new()), None)
        .unwrap_err();
    assert!(matches!(err, FlowError::Endpoint { ref endpoint, .. } if endpoint == "First"));
    assert!(second_received.lock().is_empty());
}

#[test]
fn test_dotted_dedicated_name_cannot_shadow_existing_namespace() {
    let (_, hub) = process_hub();
    let (a, a_received) = recording_endpoint("A", &[]);
    hub.bind_endpoint(a).unwrap();

    let err = hub
        .bind_endpoint(recording_endpoint("A.B", &[("x", "1")]).0)
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidEndpointName(ref name) if name == "A.B"));

    let mut snapshot = Snapshot::new();
    hub.capture_values_to(&mut snapshot, None).unwrap();
    assert!(snapshot.is_empty());

    snapshot.insert("A.B.x".to_string(), "1".to_string());
    hub.restore_values_from(Some(&snapshot), None).unwrap();
    assert_eq!(*a_received.lock(), vec![pairs(&[("B.x", "1")])]);
    assert_eq!(hub.diagnostics()["dedicated_prefixes"], serde_json::json!(["A."]));
}
