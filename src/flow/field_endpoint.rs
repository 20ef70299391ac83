//! Built-in endpoint bridging exposed ambient fields into the hub.

use crate::field::FieldRegistry;
use crate::flow::contract::FlowContract;
use crate::flow::endpoint::{CaptureSink, EndpointBinding};
use crate::flow::FIELD_ENDPOINT_NAME;
use std::sync::Arc;
use tracing::debug;

/// Binding for the field endpoint over `fields`.
pub(crate) fn binding(fields: Arc<FieldRegistry>) -> EndpointBinding {
    let capture_fields = Arc::clone(&fields);
    EndpointBinding::new(
        FIELD_ENDPOINT_NAME,
        move |contract, sink| capture(&capture_fields, contract, sink),
        move |contract, entries| restore(&fields, contract, entries),
    )
}

/// Emit every included exposed field that holds a value.
fn capture(
    fields: &FieldRegistry,
    contract: &FlowContract,
    sink: &mut CaptureSink<'_>,
) -> anyhow::Result<()> {
    if !fields.adapter().is_usable() {
        return Ok(());
    }

    for field in fields
        .exposed()
        .iter()
        .filter(|field| contract.is_field_included(field.name()))
    {
        if let Some(value) = field.value()? {
            sink.emit(field.name(), &value)?;
        }
    }
    Ok(())
}

/// Set included values on matching exposed fields; stage the rest for fields
/// that are created later.
fn restore(
    fields: &FieldRegistry,
    contract: &FlowContract,
    entries: &[(String, String)],
) -> anyhow::Result<()> {
    if !fields.adapter().is_usable() {
        return Ok(());
    }

    for (name, value) in entries
        .iter()
        .filter(|(name, _)| contract.is_field_included(name))
    {
        match fields.find_exposed(name) {
            Some(field) => {
                debug!(field = %name, "Restoring ambient field");
                field.set_value(value)?;
            }
            None => {
                debug!(field = %name, "Staging value for ambient field");
                fields.inject_pre_staged_value(name, value)?;
            }
        }
    }
    Ok(())
}
