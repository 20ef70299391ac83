//! Process-wide adapter: one shared container for the whole process.

use super::{ContextAdapter, TerminationHook};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::debug;

/// Adapter backed by a single process-wide map.
///
/// Useful for hosts without request scopes (workers, CLIs) and for tests.
/// `terminate_current_context` fires the registered hooks and then clears
/// every stored value.
#[derive(Default)]
pub struct ProcessContextAdapter {
    values: RwLock<HashMap<String, String>>,
    terminating: Mutex<Vec<TerminationHook>>,
}

impl ProcessContextAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the end of the current context.
    pub fn terminate_current_context(&self) {
        let hooks = std::mem::take(&mut *self.terminating.lock());
        debug!(hooks = hooks.len(), "Process context terminating");
        for hook in hooks {
            hook();
        }
        self.values.write().clear();
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl ContextAdapter for ProcessContextAdapter {
    fn is_usable(&self) -> bool {
        true
    }

    fn set_current_value(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn try_get_current_value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn on_current_context_terminating(&self, hook: TerminationHook) {
        self.terminating.lock().push(hook);
    }

    fn name(&self) -> &str {
        "process"
    }
}
