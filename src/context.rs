//! Context adapters: the technology-specific store that backs ambient fields.
//!
//! An adapter ties values to some lifetime scope (request, call, process) and
//! signals when that scope is about to terminate.

mod never;
mod process;

pub use never::NeverUsableContextAdapter;
pub use process::ProcessContextAdapter;

use std::sync::Arc;

/// Callback fired shortly before the current context terminates.
pub type TerminationHook = Arc<dyn Fn() + Send + Sync>;

/// Bridge between ambient fields and a technology-specific value container.
pub trait ContextAdapter: Send + Sync {
    /// Whether `set_current_value` and `try_get_current_value` may be called.
    fn is_usable(&self) -> bool;

    fn set_current_value(&self, key: &str, value: &str);

    fn try_get_current_value(&self, key: &str) -> Option<String>;

    /// Register a hook fired once when the current context is terminating.
    ///
    /// Values must still be readable while the hooks run.
    fn on_current_context_terminating(&self, hook: TerminationHook);

    /// Short adapter name for diagnostics.
    fn name(&self) -> &str;
}
