//! Capture through the flow hub: namespacing, dumps and violations

use super::test_utils::{process_hub, recording_endpoint};
use ambience::flow::{EndpointBinding, Snapshot};
use ambience::FlowError;

#[test]
fn test_dump_prefixes_dedicated_keys_in_bind_order() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "Foo")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("B", &[("b1", "Bar")]).0)
        .unwrap();

    assert_eq!(
        hub.capture_values_as_dump(None).unwrap(),
        "A.a1: Foo\nB.b1: Bar\n"
    );
}

#[test]
fn test_mixed_capture_builds_flat_snapshot() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "1"), ("a2", "2")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("B", &[("b1", "3")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("^Root", &[("g1", "4"), ("g2", "5")]).0)
        .unwrap();

    let mut snapshot = Snapshot::new();
    hub.capture_values_to(&mut snapshot, None).unwrap();

    let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["A.a1", "A.a2", "B.b1", "g1", "g2"]);
    assert_eq!(snapshot["B.b1"], "3");
}

#[test]
fn test_capture_to_keeps_unrelated_entries() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "new")]).0)
        .unwrap();

    let mut snapshot = Snapshot::new();
    snapshot.insert("A.a1".to_string(), "old".to_string());
    snapshot.insert("transport".to_string(), "kept".to_string());
    hub.capture_values_to(&mut snapshot, None).unwrap();

    assert_eq!(snapshot["A.a1"], "new");
    assert_eq!(snapshot["transport"], "kept");
}

#[test]
fn test_duplicate_key_across_global_endpoints() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("^First", &[("shared", "1")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("^Second", &[("shared", "2")]).0)
        .unwrap();

    let mut buffer = Vec::new();
    let err = hub
        .capture_values_with(None, |k, v| buffer.push((k.to_string(), v.to_string())))
        .unwrap_err();

    match err {
        FlowError::DuplicateKey { endpoint, key } => {
            assert_eq!(endpoint, "^Second");
            assert_eq!(key, "shared");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(buffer.len(), 1);
}

#[test]
fn test_duplicate_key_within_one_endpoint_keeps_earlier_entries() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(
        recording_endpoint("A", &[("a1", "x"), ("a2", "y"), ("a3", "z"), ("a1", "again")]).0,
    )
    .unwrap();

    let mut buffer = Vec::new();
    let err = hub
        .capture_values_with(None, |k, _| buffer.push(k.to_string()))
        .unwrap_err();

    assert!(matches!(err, FlowError::DuplicateKey { ref key, .. } if key == "A.a1"));
    assert_eq!(buffer, vec!["A.a1", "A.a2", "A.a3"]);
}

#[test]
fn test_global_endpoint_cannot_write_into_dedicated_namespace() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "x")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("^Sneaky", &[("g1", "y"), ("a.a2", "z")]).0)
        .unwrap();

    let mut buffer = Vec::new();
    let err = hub
        .capture_values_with(None, |k, _| buffer.push(k.to_string()))
        .unwrap_err();

    match err {
        FlowError::PrefixTransgression {
            endpoint,
            key,
            prefix,
        } => {
            assert_eq!(endpoint, "^Sneaky");
            assert_eq!(key, "a.a2");
            assert_eq!(prefix, "a.");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(buffer, vec!["A.a1", "g1"]);
}

#[test]
fn test_violation_aborts_even_if_callback_swallows_it() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(EndpointBinding::simple(
        "A",
        |sink| {
            let _ = sink.emit("k", "1");
            let _ = sink.emit("k", "2");
            Ok(())
        },
        |_| Ok(()),
    ))
    .unwrap();
    hub.bind_endpoint(recording_endpoint("B", &[("b1", "never")]).0)
        .unwrap();

    let mut buffer = Vec::new();
    let err = hub
        .capture_values_with(None, |k, _| buffer.push(k.to_string()))
        .unwrap_err();
    assert!(matches!(err, FlowError::DuplicateKey { .. }));
    assert_eq!(buffer, vec!["A.k"]);
}

#[test]
fn test_capture_error_from_callback_names_endpoint() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(EndpointBinding::simple(
        "Broken",
        |_| Err(anyhow::anyhow!("cannot read value")),
        |_| Ok(()),
    ))
    .unwrap();

    match hub.capture_values_as_dump(None).unwrap_err() {
        FlowError::Endpoint { endpoint, .. } => assert_eq!(endpoint, "Broken"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reset_drops_custom_endpoints_from_capture() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "x")]).0)
        .unwrap();
    hub.reset_custom_bindings();
    assert_eq!(hub.capture_values_as_dump(None).unwrap(), "");
}
