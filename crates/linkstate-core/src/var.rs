//! Named variables
//!
//! A `Variable` is a mutable single-value cell with change notification.
//! Writes are equality gated: setting the current value again is a no-op and
//! fires nothing. Fan-out happens synchronously within `set`, after the value
//! and listener locks are released, so listeners may re-enter the variable.

use std::fmt;

use parking_lot::Mutex;

use crate::{
    ChangeEmitter, ChangeEvent, ExtraInfo, Listener, Subscription, Value, CHANGE_EVENT,
};

/// A named, observable mutable value cell.
pub struct Variable {
    /// Owning group name, `None` for the default group.
    group: Option<String>,
    name: String,
    value: Mutex<Value>,
    emitter: Mutex<ChangeEmitter>,
}

impl Variable {
    pub(crate) fn new(group: Option<&str>, name: &str) -> Self {
        Variable {
            group: group.map(str::to_owned),
            name: name.to_owned(),
            value: Mutex::new(Value::None),
            emitter: Mutex::new(ChangeEmitter::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning group, `None` for the default group.
    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Addressing key for external mirroring collaborators:
    /// `"{group}-{name}"` for a named group, bare `"{name}"` otherwise.
    pub fn scoped_key(&self) -> String {
        match &self.group {
            Some(group) => format!("{group}-{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.value.lock().clone()
    }

    /// Store a new value and notify listeners.
    ///
    /// Setting a value equal to the current one returns without side effects.
    pub fn set(&self, value: Value, extra: Option<ExtraInfo>) {
        let old_value = {
            let mut current = self.value.lock();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };

        tracing::trace!(variable = %self.scoped_key(), "variable changed");

        let event = ChangeEvent::new(old_value, value, extra.unwrap_or_default());
        for listener in self.listeners() {
            listener(&event);
        }
    }

    /// Subscribe to this variable's `"change"` event.
    pub fn on_change(
        &self,
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.emitter.lock().on(CHANGE_EVENT, listener)
    }

    /// Cancel a subscription created by `on_change`.
    pub fn off(&self, sub: &Subscription) -> bool {
        self.emitter.lock().off(sub)
    }

    /// Number of active change listeners.
    pub fn listener_count(&self) -> usize {
        self.emitter.lock().listener_count(CHANGE_EVENT)
    }

    // Snapshot taken under the lock, invoked outside it.
    fn listeners(&self) -> Vec<Listener> {
        self.emitter.lock().listeners(CHANGE_EVENT)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("key", &self.scoped_key())
            .field("value", &*self.value.lock())
            .finish()
    }
}
