//! Field registry: the exposed-instance catalog.

use crate::context::ContextAdapter;
use crate::error::FieldError;
use crate::field::ambient::AmbientField;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Creates ambient fields over one context adapter and tracks exposed ones.
pub struct FieldRegistry {
    adapter: Arc<dyn ContextAdapter>,
    exposed: RwLock<Vec<Arc<AmbientField>>>,
}

impl FieldRegistry {
    pub fn new(adapter: Arc<dyn ContextAdapter>) -> Self {
        Self {
            adapter,
            exposed: RwLock::new(Vec::new()),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn ContextAdapter> {
        &self.adapter
    }

    /// Create a private field; it never flows and never sees staged values.
    pub fn field(&self, name: &str) -> Arc<AmbientField> {
        AmbientField::create(name, false, Arc::clone(&self.adapter))
    }

    /// Create an exposed field and add it to the catalog.
    ///
    /// A value staged under `name` before this call becomes its initial value.
    pub fn expose(&self, name: &str) -> Result<Arc<AmbientField>, FieldError> {
        let mut exposed = self.exposed.write();
        if exposed
            .iter()
            .any(|field| field.name().eq_ignore_ascii_case(name))
        {
            return Err(FieldError::DuplicateExposedField(name.to_string()));
        }
        let field = AmbientField::create(name, true, Arc::clone(&self.adapter));
        exposed.push(Arc::clone(&field));
        debug!(field = name, "Exposed ambient field registered");
        Ok(field)
    }

    /// Exposed fields in registration order.
    pub fn exposed(&self) -> Vec<Arc<AmbientField>> {
        self.exposed.read().clone()
    }

    /// Case-insensitive lookup in the exposed catalog.
    pub fn find_exposed(&self, name: &str) -> Option<Arc<AmbientField>> {
        self.exposed
            .read()
            .iter()
            .find(|field| field.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Write a value directly into the context adapter, bypassing any field,
    /// so that an exposed field created later under `name` picks it up.
    pub fn inject_pre_staged_value(&self, name: &str, value: &str) -> Result<(), FieldError> {
        if !self.adapter.is_usable() {
            return Err(FieldError::ContextUnavailable(name.to_string()));
        }
        self.adapter.set_current_value(name, value);
        Ok(())
    }

    pub fn clear_exposed(&self) {
        self.exposed.write().clear();
    }
}
