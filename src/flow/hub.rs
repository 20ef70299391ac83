//! The flow hub: endpoint registry, ordered restore and contract resolution.

use crate::config::{HubConfig, NullSnapshotPolicy};
use crate::error::{ContractError, FieldError, FlowError};
use crate::field::FieldRegistry;
use crate::flow::contract::{ContractTable, FlowContract};
use crate::flow::endpoint::{
    is_global_name, priority_key, strip_prefix_ignore_case, CaptureSink, Endpoint,
    EndpointBinding, GLOBAL_MARKER,
};
use crate::flow::{field_endpoint, Snapshot};
use crate::priority::PreferenceOrder;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hook invoked when restore receives no snapshot.
///
/// It may substitute a snapshot (possibly empty) or fail.
pub type NullSnapshotHandler = Arc<dyn Fn() -> Result<Snapshot, FlowError> + Send + Sync>;

/// Hook invoked with the endpoint name and elapsed milliseconds when a restore
/// callback exceeds its budget.
pub type SlowRestoreHandler = Arc<dyn Fn(&str, u64) + Send + Sync>;

/// Endpoints in restore order plus the namespaces they reserve.
///
/// Replaced wholesale on every bind; readers keep the view they started with.
#[derive(Default)]
struct EndpointView {
    in_restore_order: Vec<Arc<Endpoint>>,
    dedicated_prefixes: Vec<String>,
}

struct EndpointTable {
    priorities: PreferenceOrder<String>,
    view: Arc<EndpointView>,
}

/// Central registry of capture/restore endpoints.
///
/// A fresh hub (and every reset) starts with the built-in field endpoint
/// bound under [`FIELD_ENDPOINT_NAME`](crate::flow::FIELD_ENDPOINT_NAME).
pub struct FlowHub {
    fields: Arc<FieldRegistry>,
    settings: HubConfig,
    endpoints: RwLock<EndpointTable>,
    contracts: ContractTable,
    null_snapshot_handler: RwLock<Option<NullSnapshotHandler>>,
    slow_restore_handler: RwLock<Option<SlowRestoreHandler>>,
}

impl FlowHub {
    pub fn new(fields: Arc<FieldRegistry>) -> Self {
        Self::with_config(fields, HubConfig::default())
    }

    pub fn with_config(fields: Arc<FieldRegistry>, settings: HubConfig) -> Self {
        let table = fresh_table(&fields, settings.default_restore_budget_ms);
        let null_snapshot_handler = null_snapshot_handler_for(settings.null_snapshot);
        let slow_restore_handler = settings
            .report_slow_restores
            .then(default_slow_restore_handler);
        Self {
            fields,
            settings,
            endpoints: RwLock::new(table),
            contracts: ContractTable::new(),
            null_snapshot_handler: RwLock::new(null_snapshot_handler),
            slow_restore_handler: RwLock::new(slow_restore_handler),
        }
    }

    pub fn fields(&self) -> &Arc<FieldRegistry> {
        &self.fields
    }

    pub fn settings(&self) -> &HubConfig {
        &self.settings
    }

    /// Bind a new endpoint.
    ///
    /// Names starting with `^` are global. Dedicated names may not contain
    /// `.`, so no reserved prefix can ever start with another one. Fails if an
    /// existing endpoint name ends with the new name (case-insensitive), or if
    /// the declared restore dependencies are cyclic; nothing changes on failure.
    pub fn bind_endpoint(&self, binding: EndpointBinding) -> Result<(), FlowError> {
        let name = binding.name.clone();
        if name.trim().is_empty()
            || name.trim_start_matches(GLOBAL_MARKER).is_empty()
            || (!is_global_name(&name) && name.contains('.'))
        {
            return Err(FlowError::InvalidEndpointName(name));
        }
        let key = priority_key(&name);

        let mut table = self.endpoints.write();

        if table
            .view
            .in_restore_order
            .iter()
            .any(|endpoint| endpoint.priority_key.ends_with(&key))
        {
            return Err(FlowError::DuplicateEndpoint(name));
        }

        let priorities = table.priorities.clone();
        for dependency in &binding.restore_after {
            let accepted = priorities
                .try_declare_preference(Some(priority_key(dependency)), Some(key.clone()))?;
            if !accepted {
                return Err(FlowError::CyclicDependency {
                    endpoint: name,
                    dependency: dependency.clone(),
                });
            }
        }

        let endpoint = Arc::new(Endpoint::from_binding(
            binding,
            self.settings.default_restore_budget_ms,
        ));
        let mut in_restore_order = table.view.in_restore_order.clone();
        in_restore_order.push(endpoint);
        priorities.sort_by_priority_key(&mut in_restore_order, |endpoint| &endpoint.priority_key);

        let dedicated_prefixes = in_restore_order
            .iter()
            .filter(|endpoint| !endpoint.global)
            .map(|endpoint| endpoint.prefix.clone())
            .collect();

        table.priorities = priorities;
        table.view = Arc::new(EndpointView {
            in_restore_order,
            dedicated_prefixes,
        });

        debug!(
            endpoint = %name,
            global = is_global_name(&name),
            endpoints = table.view.in_restore_order.len(),
            "Endpoint bound"
        );
        Ok(())
    }

    /// Drop every custom endpoint and restore ordering rule; the built-in
    /// field endpoint is bound again.
    pub fn reset_custom_bindings(&self) {
        *self.endpoints.write() =
            fresh_table(&self.fields, self.settings.default_restore_budget_ms);
        info!("Flow hub endpoints reset");
    }

    /// Define a named flow contract. From then on every capture and restore
    /// must name a contract.
    pub fn define_flow_contract<F>(
        &self,
        name: &str,
        definition: F,
    ) -> Result<Arc<FlowContract>, ContractError>
    where
        F: FnOnce(&mut FlowContract) -> Result<(), ContractError>,
    {
        self.contracts.define(name, definition)
    }

    /// Forget all contracts and go back to "include everything" mode.
    pub fn disable_and_reset_flow_contracts(&self) {
        self.contracts.reset();
        info!("Flow contracts reset");
    }

    pub fn contracts(&self) -> &ContractTable {
        &self.contracts
    }

    /// Replace the null-snapshot hook; `None` makes restore skip silently.
    pub fn set_null_snapshot_handler(&self, handler: Option<NullSnapshotHandler>) {
        *self.null_snapshot_handler.write() = handler;
    }

    /// Replace the slow-restore hook; `None` disables reporting.
    pub fn set_slow_restore_handler(&self, handler: Option<SlowRestoreHandler>) {
        *self.slow_restore_handler.write() = handler;
    }

    /// Endpoint names in restore order.
    pub fn endpoint_names(&self) -> Vec<String> {
        self.current_view()
            .in_restore_order
            .iter()
            .map(|endpoint| endpoint.name.clone())
            .collect()
    }

    /// Capture the current values of all included endpoints into `target`.
    ///
    /// Values reach `target` as they are emitted, so after a failed capture
    /// it holds exactly the entries emitted before the failure.
    pub fn capture_values_with<F>(
        &self,
        contract_name: Option<&str>,
        mut target: F,
    ) -> Result<(), FlowError>
    where
        F: FnMut(&str, &str),
    {
        let contract = self.contracts.resolve(contract_name)?;
        let view = self.current_view();
        let mut captured_keys = HashSet::new();

        for endpoint in view
            .in_restore_order
            .iter()
            .filter(|endpoint| contract.is_endpoint_included(&endpoint.name))
        {
            let mut sink = CaptureSink::new(
                endpoint,
                &view.dedicated_prefixes,
                &mut captured_keys,
                &mut target,
            );
            let outcome = (endpoint.capture)(contract.as_ref(), &mut sink);
            if let Some(err) = sink.into_failure() {
                return Err(err);
            }
            outcome.map_err(|err| endpoint_failure(&endpoint.name, err))?;
        }

        debug!(entries = captured_keys.len(), "Captured ambient snapshot");
        Ok(())
    }

    /// Capture into a snapshot map, overwriting entries with the same key
    /// and keeping all others.
    pub fn capture_values_to(
        &self,
        target: &mut Snapshot,
        contract_name: Option<&str>,
    ) -> Result<(), FlowError> {
        self.capture_values_with(contract_name, |key, value| {
            target.insert(key.to_string(), value.to_string());
        })
    }

    /// Human readable capture: one `"{key}: {value}"` line per entry, in
    /// capture order.
    pub fn capture_values_as_dump(&self, contract_name: Option<&str>) -> Result<String, FlowError> {
        let mut dump = String::new();
        self.capture_values_with(contract_name, |key, value| {
            let _ = writeln!(dump, "{}: {}", key, value);
        })?;
        Ok(dump)
    }

    /// Restore `source` into all included endpoints, in restore order.
    ///
    /// `None` goes through the null-snapshot hook: the default fails, a
    /// custom hook may substitute a snapshot, and no hook at all skips the
    /// restore without invoking any endpoint.
    pub fn restore_values_from(
        &self,
        source: Option<&Snapshot>,
        contract_name: Option<&str>,
    ) -> Result<(), FlowError> {
        let substituted;
        let source = match source {
            Some(source) => source,
            None => {
                let handler = self.null_snapshot_handler.read().clone();
                match handler {
                    Some(handler) => {
                        substituted = handler()?;
                        &substituted
                    }
                    None => {
                        debug!("Restore skipped: no snapshot and no null-snapshot handler");
                        return Ok(());
                    }
                }
            }
        };

        let contract = self.contracts.resolve(contract_name)?;
        let view = self.current_view();

        for endpoint in view
            .in_restore_order
            .iter()
            .filter(|endpoint| contract.is_endpoint_included(&endpoint.name))
        {
            let entries = entries_for(endpoint, source, &view.dedicated_prefixes);

            let started = Instant::now();
            (endpoint.restore)(contract.as_ref(), &entries)
                .map_err(|err| endpoint_failure(&endpoint.name, err))?;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            if elapsed_ms > endpoint.restore_budget_ms {
                let handler = self.slow_restore_handler.read().clone();
                if let Some(handler) = handler {
                    handler(&endpoint.name, elapsed_ms);
                }
            }
        }

        debug!(entries = source.len(), "Restored ambient snapshot");
        Ok(())
    }

    /// Diagnostic report: endpoints in restore order, then the ordering rules.
    pub fn dump_endpoints(&self) -> String {
        let table = self.endpoints.read();
        let mut report = String::from("ENDPOINTS:\n");
        for endpoint in &table.view.in_restore_order {
            let _ = writeln!(
                report,
                "  {} ({}, budget {}ms)",
                endpoint.name,
                if endpoint.global { "global" } else { "dedicated" },
                endpoint.restore_budget_ms
            );
        }
        report.push_str(&table.priorities.dump_preferences());
        report
    }

    /// Machine readable view of the hub state.
    pub fn diagnostics(&self) -> Value {
        let view = self.current_view();
        let endpoints: Vec<Value> = view
            .in_restore_order
            .iter()
            .map(|endpoint| {
                json!({
                    "name": endpoint.name,
                    "global": endpoint.global,
                    "restore_budget_ms": endpoint.restore_budget_ms,
                    "restore_after": endpoint.restore_after,
                })
            })
            .collect();
        json!({
            "endpoints": endpoints,
            "dedicated_prefixes": view.dedicated_prefixes,
            "contracts": self.contracts.names(),
            "contracts_configured": self.contracts.is_configured(),
        })
    }

    fn current_view(&self) -> Arc<EndpointView> {
        Arc::clone(&self.endpoints.read().view)
    }
}

fn fresh_table(fields: &Arc<FieldRegistry>, default_budget_ms: u64) -> EndpointTable {
    let field_endpoint = Endpoint::from_binding(
        field_endpoint::binding(Arc::clone(fields)),
        default_budget_ms,
    );
    EndpointTable {
        priorities: PreferenceOrder::new(),
        view: Arc::new(EndpointView {
            in_restore_order: vec![Arc::new(field_endpoint)],
            dedicated_prefixes: Vec::new(),
        }),
    }
}

/// Entries of `source` addressed to `endpoint`, with local keys.
fn entries_for(
    endpoint: &Endpoint,
    source: &Snapshot,
    dedicated_prefixes: &[String],
) -> Vec<(String, String)> {
    if endpoint.global {
        source
            .iter()
            .filter(|(key, _)| {
                !dedicated_prefixes
                    .iter()
                    .any(|prefix| strip_prefix_ignore_case(key, prefix).is_some())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    } else {
        source
            .iter()
            .filter_map(|(key, value)| {
                strip_prefix_ignore_case(key, &endpoint.prefix)
                    .map(|local| (local.to_string(), value.clone()))
            })
            .collect()
    }
}

/// Recover typed library errors raised inside a callback.
fn endpoint_failure(endpoint: &str, err: anyhow::Error) -> FlowError {
    match err.downcast::<FlowError>() {
        Ok(flow) => flow,
        Err(err) => match err.downcast::<FieldError>() {
            Ok(field) => FlowError::Field(field),
            Err(source) => FlowError::Endpoint {
                endpoint: endpoint.to_string(),
                source,
            },
        },
    }
}

fn null_snapshot_handler_for(policy: NullSnapshotPolicy) -> Option<NullSnapshotHandler> {
    let handler: NullSnapshotHandler = match policy {
        NullSnapshotPolicy::Fail => Arc::new(|| Err(FlowError::NullSnapshot)),
        NullSnapshotPolicy::Empty => Arc::new(|| Ok(Snapshot::new())),
        NullSnapshotPolicy::Skip => return None,
    };
    Some(handler)
}

fn default_slow_restore_handler() -> SlowRestoreHandler {
    Arc::new(|endpoint: &str, elapsed_ms: u64| {
        warn!(
            endpoint,
            elapsed_ms, "Restore performance assert failed: endpoint exceeded its restore budget"
        );
    })
}
