//! Ambient fields: named values carried by the current context.
//!
//! The registry keeps the catalog of exposed instances, which are the fields
//! eligible to flow across call boundaries.

mod ambient;
mod registry;

pub use ambient::{AmbientField, ValueHook};
pub use registry::FieldRegistry;
