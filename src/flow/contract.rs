//! Flow contracts: frozen filters selecting which endpoints and exposed fields
//! take part in one capture or restore.

use crate::error::ContractError;
use crate::flow::FIELD_ENDPOINT_NAME;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Inclusion rules for one kind of participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selection {
    include_all: bool,
    include_any: bool,
    included: Vec<String>,
    excluded: Vec<String>,
}

impl Selection {
    fn everything() -> Self {
        Self {
            include_all: true,
            include_any: true,
            ..Self::default()
        }
    }

    fn is_included(&self, name: &str) -> bool {
        if !self.include_any {
            return false;
        }
        if self.excluded.iter().any(|excluded| excluded == name) {
            return false;
        }
        self.include_all || self.included.iter().any(|included| included == name)
    }
}

/// Selects the participants of a capture or restore.
///
/// Contracts are built inside a definition callback and frozen right after;
/// every mutator fails on a frozen contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowContract {
    fields: Selection,
    endpoints: Selection,
    immutable: bool,
}

impl Default for FlowContract {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowContract {
    /// Empty, still mutable contract that includes nothing.
    pub fn new() -> Self {
        Self {
            fields: Selection::default(),
            endpoints: Selection::default(),
            immutable: false,
        }
    }

    /// Frozen contract including every endpoint and every exposed field.
    ///
    /// Used whenever no contract was ever defined.
    pub fn include_everything() -> Self {
        Self {
            fields: Selection::everything(),
            endpoints: Selection::everything(),
            immutable: true,
        }
    }

    pub fn include_all_fields(&mut self) -> Result<&mut Self, ContractError> {
        self.guard()?;
        self.fields.include_all = true;
        self.fields.include_any = true;
        Ok(self)
    }

    pub fn include_fields<I, S>(&mut self, names: I) -> Result<&mut Self, ContractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard()?;
        self.fields.include_any = true;
        self.fields.included.extend(names.into_iter().map(Into::into));
        Ok(self)
    }

    pub fn exclude_fields<I, S>(&mut self, names: I) -> Result<&mut Self, ContractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard()?;
        self.fields.excluded.extend(names.into_iter().map(Into::into));
        Ok(self)
    }

    pub fn include_all_endpoints(&mut self) -> Result<&mut Self, ContractError> {
        self.guard()?;
        self.endpoints.include_all = true;
        self.endpoints.include_any = true;
        Ok(self)
    }

    pub fn include_endpoints<I, S>(&mut self, names: I) -> Result<&mut Self, ContractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard()?;
        self.endpoints.include_any = true;
        self.endpoints
            .included
            .extend(names.into_iter().map(Into::into));
        Ok(self)
    }

    pub fn exclude_endpoints<I, S>(&mut self, names: I) -> Result<&mut Self, ContractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard()?;
        self.endpoints
            .excluded
            .extend(names.into_iter().map(Into::into));
        Ok(self)
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub(crate) fn freeze(&mut self) {
        self.immutable = true;
    }

    fn guard(&self) -> Result<(), ContractError> {
        if self.immutable {
            return Err(ContractError::ImmutableContractModification);
        }
        Ok(())
    }

    /// Whether the exposed field `name` participates.
    pub fn is_field_included(&self, name: &str) -> bool {
        self.fields.is_included(name)
    }

    /// Whether the endpoint `name` participates.
    ///
    /// The built-in field endpoint is never selected by name: it takes part
    /// whenever any field can be included.
    pub fn is_endpoint_included(&self, name: &str) -> bool {
        if name == FIELD_ENDPOINT_NAME {
            return self.fields.include_any;
        }
        self.endpoints.is_included(name)
    }
}

/// Process-scoped table of named contracts.
///
/// Starts unconfigured; the first definition switches every capture and
/// restore to require a contract name.
pub struct ContractTable {
    contracts: RwLock<Option<HashMap<String, Arc<FlowContract>>>>,
    default_contract: Arc<FlowContract>,
}

impl Default for ContractTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractTable {
    pub fn new() -> Self {
        Self {
            contracts: RwLock::new(None),
            default_contract: Arc::new(FlowContract::include_everything()),
        }
    }

    /// Define and freeze a contract named `name` (lowercase, non-empty).
    pub fn define<F>(&self, name: &str, definition: F) -> Result<Arc<FlowContract>, ContractError>
    where
        F: FnOnce(&mut FlowContract) -> Result<(), ContractError>,
    {
        if name.trim().is_empty() || name != name.to_lowercase() {
            return Err(ContractError::InvalidContractName(name.to_string()));
        }
        if self.contains(name) {
            return Err(ContractError::DuplicateContract(name.to_string()));
        }

        let mut contract = FlowContract::new();
        definition(&mut contract)?;
        contract.freeze();
        let contract = Arc::new(contract);

        let mut contracts = self.contracts.write();
        let table = contracts.get_or_insert_with(HashMap::new);
        if table.contains_key(name) {
            return Err(ContractError::DuplicateContract(name.to_string()));
        }
        table.insert(name.to_string(), Arc::clone(&contract));
        debug!(contract = name, "Flow contract defined");
        Ok(contract)
    }

    /// Resolve the contract for one capture or restore.
    ///
    /// Blank names count as absent.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<FlowContract>, ContractError> {
        let name = name.filter(|name| !name.trim().is_empty());
        let contracts = self.contracts.read();
        match (contracts.as_ref(), name) {
            (None, None) => Ok(Arc::clone(&self.default_contract)),
            (None, Some(name)) => Err(ContractError::ContractsNotConfigured(name.to_string())),
            (Some(_), None) => Err(ContractError::ContractRequired),
            (Some(table), Some(name)) => table
                .get(name)
                .cloned()
                .ok_or_else(|| ContractError::UnknownContract(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contracts
            .read()
            .as_ref()
            .is_some_and(|table| table.contains_key(name))
    }

    pub fn is_configured(&self) -> bool {
        self.contracts.read().is_some()
    }

    /// Defined contract names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .contracts
            .read()
            .as_ref()
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Drop every contract and return to the unconfigured state.
    pub fn reset(&self) {
        *self.contracts.write() = None;
    }
}
