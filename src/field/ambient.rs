//! A named ambient value cell.

use crate::context::ContextAdapter;
use crate::error::FieldError;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Hook receiving the value of a field while its context terminates.
pub type ValueHook = Arc<dyn Fn(Option<String>) + Send + Sync>;

thread_local! {
    /// Per-thread branch overrides keyed by field instance id.
    static BRANCH_OVERRIDES: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

fn branch_override(instance_id: u64) -> Option<String> {
    BRANCH_OVERRIDES.with(|overrides| overrides.borrow().get(&instance_id).cloned())
}

fn swap_branch_override(instance_id: u64, value: Option<String>) -> Option<String> {
    BRANCH_OVERRIDES.with(|overrides| {
        let mut overrides = overrides.borrow_mut();
        match value {
            Some(value) => overrides.insert(instance_id, value),
            None => overrides.remove(&instance_id),
        }
    })
}

/// Puts the previous override back when a temporary branch ends, even on unwind.
struct BranchGuard {
    instance_id: u64,
    rescued: Option<Option<String>>,
}

impl Drop for BranchGuard {
    fn drop(&mut self) {
        if let Some(rescued) = self.rescued.take() {
            swap_branch_override(self.instance_id, rescued);
        }
    }
}

fn next_instance_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Named string value stored in the current context.
///
/// Exposed fields use their name as key in the context adapter, so values can
/// be staged before the field exists. Private fields get a `name'<id>` key
/// that cannot collide with entries written by anybody else.
pub struct AmbientField {
    name: String,
    key: String,
    instance_id: u64,
    exposed: bool,
    adapter: Arc<dyn ContextAdapter>,
    root_value_is_write_once: AtomicBool,
    subscribed: AtomicBool,
    terminating_hook: RwLock<Option<ValueHook>>,
    this: Weak<AmbientField>,
}

impl fmt::Debug for AmbientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientField")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("exposed", &self.exposed)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

impl AmbientField {
    pub(crate) fn create(
        name: &str,
        exposed: bool,
        adapter: Arc<dyn ContextAdapter>,
    ) -> Arc<Self> {
        let instance_id = next_instance_id();
        let key = if exposed {
            name.to_string()
        } else {
            format!("{}'{}", name, instance_id)
        };
        Arc::new_cyclic(|this| AmbientField {
            name: name.to_string(),
            key,
            instance_id,
            exposed,
            adapter,
            root_value_is_write_once: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            terminating_hook: RwLock::new(None),
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key under which the value is stored in the context adapter.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    /// Current value; `None` if it was never set in this context.
    ///
    /// A temporary branch active on the calling thread takes precedence.
    pub fn value(&self) -> Result<Option<String>, FieldError> {
        if let Some(value) = branch_override(self.instance_id) {
            return Ok(Some(value));
        }
        self.assert_usable()?;
        Ok(self.adapter.try_get_current_value(&self.key))
    }

    pub fn set_value(&self, value: &str) -> Result<(), FieldError> {
        self.assert_usable()?;

        if self.root_value_is_write_once() {
            if let Some(current) = self.adapter.try_get_current_value(&self.key) {
                if !current.is_empty() && current != value {
                    return Err(FieldError::WriteOnceViolation {
                        name: self.name.clone(),
                        current,
                        attempted: value.to_string(),
                    });
                }
            }
        }

        self.adapter.set_current_value(&self.key, value);
        if branch_override(self.instance_id).is_some() {
            swap_branch_override(self.instance_id, Some(value.to_string()));
        }
        Ok(())
    }

    pub fn root_value_is_write_once(&self) -> bool {
        self.root_value_is_write_once.load(Ordering::Acquire)
    }

    /// Protect the root value from changes once it holds a non-empty value.
    pub fn set_root_value_is_write_once(&self, write_once: bool) {
        self.root_value_is_write_once
            .store(write_once, Ordering::Release);
    }

    /// Run `action` while this thread sees `overriding_value` as the field value.
    ///
    /// Only this instance is affected; other fields sharing the name or key
    /// keep their values. The context adapter is not touched and the previous
    /// view is restored when `action` returns or unwinds.
    pub fn invoke_under_temporary_branch<R>(
        &self,
        overriding_value: &str,
        action: impl FnOnce() -> R,
    ) -> R {
        let rescued = swap_branch_override(self.instance_id, Some(overriding_value.to_string()));
        let _guard = BranchGuard {
            instance_id: self.instance_id,
            rescued: Some(rescued),
        };
        action()
    }

    /// Install a hook receiving the dying value when the context terminates.
    pub fn on_terminating(&self, hook: ValueHook) -> Result<(), FieldError> {
        *self.terminating_hook.write() = Some(hook);
        self.assert_usable()
    }

    fn assert_usable(&self) -> Result<(), FieldError> {
        if !self.adapter.is_usable() {
            return Err(FieldError::ContextUnavailable(self.name.clone()));
        }
        self.ensure_subscribed();
        Ok(())
    }

    fn ensure_subscribed(&self) {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        let field = self.this.clone();
        self.adapter
            .on_current_context_terminating(Arc::new(move || {
                if let Some(field) = field.upgrade() {
                    field.context_terminating();
                }
            }));
    }

    fn context_terminating(&self) {
        self.subscribed.store(false, Ordering::Release);
        let hook = self.terminating_hook.read().clone();
        if let Some(hook) = hook {
            let dying_value = self.adapter.try_get_current_value(&self.key);
            debug!(field = %self.name, "Ambient field context terminating");
            hook(dying_value);
        }
    }
}
