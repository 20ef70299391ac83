//! Flow contract resolution and filtering through the hub

use super::test_utils::{process_hub, recording_endpoint};
use ambience::flow::Snapshot;
use ambience::{ContractError, FlowError};

#[test]
fn test_contract_name_rejected_while_unconfigured() {
    let (_, hub) = process_hub();
    let err = hub.capture_values_as_dump(Some("my-contract")).unwrap_err();
    assert!(matches!(
        err,
        FlowError::Contract(ContractError::ContractsNotConfigured(ref name)) if name == "my-contract"
    ));

    let err = hub
        .restore_values_from(Some(&Snapshot::new()), Some("my-contract"))
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::Contract(ContractError::ContractsNotConfigured(_))
    ));
}

#[test]
fn test_configured_contracts_require_known_name() {
    let (_, hub) = process_hub();
    hub.define_flow_contract("my-contract", |contract| {
        contract.include_all_endpoints()?;
        Ok(())
    })
    .unwrap();

    assert!(matches!(
        hub.capture_values_as_dump(None),
        Err(FlowError::Contract(ContractError::ContractRequired))
    ));
    assert!(matches!(
        hub.capture_values_as_dump(Some("another-contract")),
        Err(FlowError::Contract(ContractError::UnknownContract(_)))
    ));
    assert!(matches!(
        hub.restore_values_from(Some(&Snapshot::new()), None),
        Err(FlowError::Contract(ContractError::ContractRequired))
    ));
    assert!(hub.capture_values_as_dump(Some("my-contract")).is_ok());
}

#[test]
fn test_contract_selects_endpoints() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("Tenant", &[("id", "t-1")]).0)
        .unwrap();
    hub.bind_endpoint(recording_endpoint("Culture", &[("name", "de-DE")]).0)
        .unwrap();
    let (secret, secret_received) = recording_endpoint("Secret", &[("token", "s3cr3t")]);
    hub.bind_endpoint(secret).unwrap();

    hub.define_flow_contract("outbound", |contract| {
        contract.include_endpoints(["Tenant", "Culture"])?;
        Ok(())
    })
    .unwrap();
    hub.define_flow_contract("all-but-secret", |contract| {
        contract
            .include_all_endpoints()?
            .exclude_endpoints(["Secret"])?;
        Ok(())
    })
    .unwrap();

    assert_eq!(
        hub.capture_values_as_dump(Some("outbound")).unwrap(),
        "Tenant.id: t-1\nCulture.name: de-DE\n"
    );

    let mut snapshot = Snapshot::new();
    snapshot.insert("Secret.token".to_string(), "forged".to_string());
    hub.restore_values_from(Some(&snapshot), Some("all-but-secret"))
        .unwrap();
    assert!(secret_received.lock().is_empty());
}

#[test]
fn test_duplicate_and_frozen_contracts() {
    let (_, hub) = process_hub();
    let contract = hub
        .define_flow_contract("once", |contract| {
            contract.include_all_fields()?;
            Ok(())
        })
        .unwrap();
    assert!(contract.is_immutable());

    assert_eq!(
        hub.define_flow_contract("once", |_| Ok(())).unwrap_err(),
        ContractError::DuplicateContract("once".to_string())
    );

    let mut copy = (*contract).clone();
    assert_eq!(
        copy.include_endpoints(["Late"]).unwrap_err(),
        ContractError::ImmutableContractModification
    );
}

#[test]
fn test_disable_and_reset_returns_to_include_everything() {
    let (_, hub) = process_hub();
    hub.bind_endpoint(recording_endpoint("A", &[("a1", "x")]).0)
        .unwrap();
    hub.define_flow_contract("nothing", |_| Ok(())).unwrap();
    assert_eq!(hub.capture_values_as_dump(Some("nothing")).unwrap(), "");

    hub.disable_and_reset_flow_contracts();
    assert_eq!(hub.capture_values_as_dump(None).unwrap(), "A.a1: x\n");
    assert!(hub.contracts().names().is_empty());
}
