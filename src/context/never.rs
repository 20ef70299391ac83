//! Adapter for hosts without any ambient container.

use super::{ContextAdapter, TerminationHook};
use tracing::warn;

/// Adapter that is never usable; writes are dropped and reads find nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverUsableContextAdapter;

impl ContextAdapter for NeverUsableContextAdapter {
    fn is_usable(&self) -> bool {
        false
    }

    fn set_current_value(&self, key: &str, _value: &str) {
        warn!(key, "Dropping write to a context adapter that is never usable");
    }

    fn try_get_current_value(&self, _key: &str) -> Option<String> {
        None
    }

    fn on_current_context_terminating(&self, _hook: TerminationHook) {}

    fn name(&self) -> &str {
        "never-usable"
    }
}
