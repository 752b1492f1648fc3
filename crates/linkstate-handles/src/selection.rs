//! Selection handle
//!
//! Unlike the filter set, selection is single-writer-wins: the group's
//! `"selection"` variable holds whatever the last writer stored. An unset
//! selection (`None`) means no selection is active and is distinct from an
//! empty selection (nothing selected).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use linkstate_core::{
    merge_extra, ChangeEmitter, ChangeEvent, ExtraInfo, Group, GroupSpec, Key, LinkResult,
    Registry, Subscription, Value, Variable, CHANGE_EVENT, SELECTION_VAR,
};

use crate::HandleId;

/// Reader/writer of a group's shared selection.
pub struct SelectionHandle {
    id: HandleId,
    group: Arc<Group>,
    selection_var: Arc<Variable>,
    extra: ExtraInfo,
    /// Handle-scoped relay between the group variable and this handle's
    /// listeners. `close` severs it in one step, and listeners registered
    /// afterwards never fire.
    relay: Arc<Mutex<ChangeEmitter>>,
    /// The single subscription this handle holds on the group variable.
    forward_sub: Subscription,
    closed: AtomicBool,
}

impl SelectionHandle {
    pub fn new(registry: &Registry, group: impl Into<GroupSpec>) -> LinkResult<Self> {
        SelectionHandle::with_extra(registry, group, ExtraInfo::new())
    }

    /// Create a handle whose `extra` entries are merged into every event it
    /// causes. A `"sender"` entry naming this handle is always present.
    pub fn with_extra(
        registry: &Registry,
        group: impl Into<GroupSpec>,
        mut extra: ExtraInfo,
    ) -> LinkResult<Self> {
        let group = registry.resolve(group.into())?;
        let selection_var = group.var(SELECTION_VAR)?;
        let id = HandleId::next();
        extra.insert("sender".to_owned(), Value::Text(id.to_string()));

        let relay = Arc::new(Mutex::new(ChangeEmitter::new()));
        let forward = Arc::clone(&relay);
        let forward_sub = selection_var.on_change(move |event| {
            let listeners = forward.lock().listeners(CHANGE_EVENT);
            for listener in listeners {
                listener(event);
            }
        });

        Ok(SelectionHandle {
            id,
            group,
            selection_var,
            extra,
            relay,
            forward_sub,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// The current selection. `None` means no selection is active;
    /// `Some(vec![])` means a selection is active with nothing in it.
    pub fn value(&self) -> Option<Vec<Key>> {
        self.selection_var.get().into_keys()
    }

    /// Overwrite the selection (last writer wins). Ignored after `close`.
    pub fn set(&self, keys: &[Key], extra: Option<ExtraInfo>) {
        self.write(Value::Keys(keys.to_vec()), extra);
    }

    /// Unset the selection entirely.
    pub fn clear(&self, extra: Option<ExtraInfo>) {
        self.write(Value::None, extra);
    }

    /// Add keys to the selection. Keys already selected are skipped; if
    /// nothing would change, nothing is written and no event fires.
    pub fn add(&self, keys: &[Key], extra: Option<ExtraInfo>) {
        if keys.is_empty() {
            return;
        }
        let current = self.value().unwrap_or_default();
        let mut result = current.clone();
        for key in keys {
            if !result.contains(key) {
                result.push(key.clone());
            }
        }
        if result.len() == current.len() {
            return;
        }
        self.set(&result, extra);
    }

    /// Remove keys from the selection. Keys not selected are skipped; if
    /// nothing would change (including an unset selection), nothing is
    /// written.
    pub fn remove(&self, keys: &[Key], extra: Option<ExtraInfo>) {
        if keys.is_empty() {
            return;
        }
        let Some(current) = self.value() else {
            return;
        };
        let result: Vec<Key> = current
            .iter()
            .filter(|key| !keys.contains(key))
            .cloned()
            .collect();
        if result.len() == current.len() {
            return;
        }
        self.set(&result, extra);
    }

    /// Flip membership of each key: selected keys are removed, unselected
    /// keys are appended.
    pub fn toggle(&self, keys: &[Key], extra: Option<ExtraInfo>) {
        if keys.is_empty() {
            return;
        }
        let current = self.value().unwrap_or_default();
        let mut result: Vec<Key> = current
            .iter()
            .filter(|key| !keys.contains(key))
            .cloned()
            .collect();
        for key in keys {
            if !current.contains(key) && !result.contains(key) {
                result.push(key.clone());
            }
        }
        if result == current {
            return;
        }
        self.set(&result, extra);
    }

    /// Subscribe to selection changes. Registrations land on this handle's
    /// relay, so they all go away with `close`; subscribing to a closed
    /// handle yields a dead subscription.
    pub fn on_change(
        &self,
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.relay.lock().on(CHANGE_EVENT, listener)
    }

    /// Cancel a subscription created by `on_change`.
    pub fn off(&self, sub: &Subscription) -> bool {
        self.relay.lock().off(sub)
    }

    /// Remove this handle's listeners. The stored selection itself is left
    /// alone; it belongs to the group, not to any one handle. Idempotent;
    /// further writes through this handle are ignored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(handle = %self.id, "closing selection handle");
        self.selection_var.off(&self.forward_sub);
        self.relay.lock().remove_all(CHANGE_EVENT);
    }

    // Every mutation funnels through here; a closed handle writes nothing.
    fn write(&self, value: Value, extra: Option<ExtraInfo>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.selection_var
            .set(value, Some(merge_extra(&self.extra, extra)));
    }
}

impl Drop for SelectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
