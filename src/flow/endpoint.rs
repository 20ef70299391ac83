//! Endpoint registrations and the namespacing capture sink.

use crate::error::FlowError;
use crate::flow::contract::FlowContract;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Leading marker of global endpoint names.
pub const GLOBAL_MARKER: char = '^';

/// Capture callback: emits local keys through the sink.
pub type CaptureFn =
    Arc<dyn Fn(&FlowContract, &mut CaptureSink<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Restore callback: receives the entries addressed to the endpoint, local keys.
pub type RestoreFn =
    Arc<dyn Fn(&FlowContract, &[(String, String)]) -> anyhow::Result<()> + Send + Sync>;

/// Description of an endpoint to bind into the hub.
pub struct EndpointBinding {
    pub(crate) name: String,
    pub(crate) capture: CaptureFn,
    pub(crate) restore: RestoreFn,
    pub(crate) restore_budget_ms: Option<u64>,
    pub(crate) restore_after: Vec<String>,
}

impl EndpointBinding {
    /// Binding whose callbacks see the contract of the running operation.
    pub fn new<C, R>(name: impl Into<String>, capture: C, restore: R) -> Self
    where
        C: Fn(&FlowContract, &mut CaptureSink<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
        R: Fn(&FlowContract, &[(String, String)]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capture: Arc::new(capture),
            restore: Arc::new(restore),
            restore_budget_ms: None,
            restore_after: Vec::new(),
        }
    }

    /// Binding whose callbacks ignore the contract.
    pub fn simple<C, R>(name: impl Into<String>, capture: C, restore: R) -> Self
    where
        C: Fn(&mut CaptureSink<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
        R: Fn(&[(String, String)]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |_contract: &FlowContract, sink: &mut CaptureSink<'_>| capture(sink),
            move |_contract: &FlowContract, entries: &[(String, String)]| restore(entries),
        )
    }

    /// Restore duration above which the slow-restore hook fires.
    pub fn restore_budget_ms(mut self, budget_ms: u64) -> Self {
        self.restore_budget_ms = Some(budget_ms);
        self
    }

    /// Endpoints that must be restored before this one.
    pub fn restore_after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restore_after.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for EndpointBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBinding")
            .field("name", &self.name)
            .field("restore_budget_ms", &self.restore_budget_ms)
            .field("restore_after", &self.restore_after)
            .finish()
    }
}

/// A bound endpoint.
pub(crate) struct Endpoint {
    pub(crate) name: String,
    /// Lowercased name used in the preference order.
    pub(crate) priority_key: String,
    /// `"{name}."` for dedicated endpoints.
    pub(crate) prefix: String,
    pub(crate) global: bool,
    pub(crate) capture: CaptureFn,
    pub(crate) restore: RestoreFn,
    pub(crate) restore_budget_ms: u64,
    pub(crate) restore_after: Vec<String>,
}

impl Endpoint {
    pub(crate) fn from_binding(binding: EndpointBinding, default_budget_ms: u64) -> Self {
        Self {
            priority_key: priority_key(&binding.name),
            prefix: format!("{}.", binding.name),
            global: is_global_name(&binding.name),
            restore_budget_ms: binding.restore_budget_ms.unwrap_or(default_budget_ms),
            name: binding.name,
            capture: binding.capture,
            restore: binding.restore,
            restore_after: binding.restore_after,
        }
    }
}

pub(crate) fn is_global_name(name: &str) -> bool {
    name.starts_with(GLOBAL_MARKER)
}

pub(crate) fn priority_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Remainder of `key` after a case-insensitive `prefix`.
pub(crate) fn strip_prefix_ignore_case<'k>(key: &'k str, prefix: &str) -> Option<&'k str> {
    let head = key.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&key[prefix.len()..])
    } else {
        None
    }
}

/// Why a capture pass was aborted.
#[derive(Debug, Clone)]
enum Violation {
    DuplicateKey { key: String },
    PrefixTransgression { key: String, prefix: String },
}

/// Emit target handed to capture callbacks.
///
/// Dedicated endpoints get their keys prefixed with `"{name}."`. The first
/// violation aborts the pass: it is returned from `emit` and every later
/// emit is refused, whether or not the callback propagates the error.
pub struct CaptureSink<'a> {
    endpoint: &'a Endpoint,
    reserved_prefixes: &'a [String],
    captured_keys: &'a mut HashSet<String>,
    target: &'a mut dyn FnMut(&str, &str),
    violation: Option<Violation>,
}

impl<'a> CaptureSink<'a> {
    pub(crate) fn new(
        endpoint: &'a Endpoint,
        reserved_prefixes: &'a [String],
        captured_keys: &'a mut HashSet<String>,
        target: &'a mut dyn FnMut(&str, &str),
    ) -> Self {
        Self {
            endpoint,
            reserved_prefixes,
            captured_keys,
            target,
            violation: None,
        }
    }

    /// Name of the endpoint being captured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint.name
    }

    pub fn emit(&mut self, key: &str, value: &str) -> Result<(), FlowError> {
        if let Some(violation) = &self.violation {
            return Err(self.to_error(violation.clone()));
        }

        let flat_key = if self.endpoint.global {
            key.to_string()
        } else {
            format!("{}{}", self.endpoint.prefix, key)
        };

        if !self.captured_keys.insert(flat_key.clone()) {
            return Err(self.fail(Violation::DuplicateKey { key: flat_key }));
        }

        if self.endpoint.global {
            let reserved_prefixes = self.reserved_prefixes;
            let reserved = reserved_prefixes
                .iter()
                .find(|prefix| strip_prefix_ignore_case(key, prefix).is_some());
            if let Some(prefix) = reserved {
                let prefix = key[..prefix.len()].to_string();
                return Err(self.fail(Violation::PrefixTransgression {
                    key: key.to_string(),
                    prefix,
                }));
            }
        }

        (self.target)(&flat_key, value);
        Ok(())
    }

    pub(crate) fn into_failure(self) -> Option<FlowError> {
        let violation = self.violation.clone()?;
        Some(self.to_error(violation))
    }

    fn fail(&mut self, violation: Violation) -> FlowError {
        self.violation = Some(violation.clone());
        self.to_error(violation)
    }

    fn to_error(&self, violation: Violation) -> FlowError {
        let endpoint = self.endpoint.name.clone();
        match violation {
            Violation::DuplicateKey { key } => FlowError::DuplicateKey { endpoint, key },
            Violation::PrefixTransgression { key, prefix } => FlowError::PrefixTransgression {
                endpoint,
                key,
                prefix,
            },
        }
    }
}
