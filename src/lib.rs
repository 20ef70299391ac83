//! Ambience: Ambient State Flow
//!
//! Captures ambient values (tenant, culture, correlation ids, ...) from
//! registered endpoints into a flat string snapshot and restores them into the
//! same endpoints on the other side of a process, thread or call boundary,
//! in a dependency-respecting order.

pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod flow;
pub mod logging;
pub mod priority;

pub use error::{ContractError, FieldError, FlowError, OrderingError, SetupError};
pub use field::{AmbientField, FieldRegistry};
pub use flow::{EndpointBinding, FlowContract, FlowHub, Snapshot};
