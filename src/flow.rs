//! Flow hub: captures ambient state from registered endpoints into a flat
//! snapshot and restores it into the same endpoints later.
//!
//! Dedicated endpoints own the key namespace `"{name}."`; global endpoints
//! (names starting with `^`) write to the root of the snapshot and must stay
//! out of every dedicated namespace.

pub mod contract;
mod endpoint;
mod field_endpoint;
mod hub;

pub use contract::{ContractTable, FlowContract};
pub use endpoint::{CaptureFn, CaptureSink, EndpointBinding, RestoreFn, GLOBAL_MARKER};
pub use hub::{FlowHub, NullSnapshotHandler, SlowRestoreHandler};

use std::collections::BTreeMap;

/// Name of the built-in endpoint that flows exposed ambient fields.
pub const FIELD_ENDPOINT_NAME: &str = "^AmbientFields";

/// Flat transport payload produced by capture and consumed by restore.
pub type Snapshot = BTreeMap<String, String>;
