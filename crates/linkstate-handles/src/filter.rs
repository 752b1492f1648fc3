//! Filter handle
//!
//! A `FilterHandle` contributes to, and listens for changes to, the filter
//! set of one group. Input adapters create a handle and call `set`/`clear`;
//! output adapters read `filtered_keys` and subscribe to changes. Handles
//! sharing a group name share one `FilterSet` and one `"filter"` variable.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use linkstate_core::{
    merge_extra, ChangeEmitter, ChangeEvent, ExtraInfo, Group, GroupSpec, Key, LinkError,
    LinkResult, Registry, Subscription, Value, Variable, CHANGE_EVENT, FILTER_SET_VAR, FILTER_VAR,
};

use crate::{FilterSet, HandleId};

/// Fetch the group's shared filter set, creating and caching it on the
/// `"filterset"` variable on first use. Handles resolving the same group
/// name all end up on one instance.
fn shared_filter_set(group: &Group) -> LinkResult<Arc<Mutex<FilterSet>>> {
    let slot = group.var(FILTER_SET_VAR)?;
    match slot.get() {
        Value::None => {
            let filter_set = Arc::new(Mutex::new(FilterSet::new()));
            let shared: Arc<dyn Any + Send + Sync> = filter_set.clone();
            slot.set(Value::Opaque(shared), None);
            Ok(filter_set)
        }
        value => value
            .downcast::<Mutex<FilterSet>>()
            .ok_or(LinkError::NotAFilterSet),
    }
}

/// Contributor to, and observer of, a group's filter set.
pub struct FilterHandle {
    id: HandleId,
    group: Arc<Group>,
    filter_set: Arc<Mutex<FilterSet>>,
    filter_var: Arc<Variable>,
    extra: ExtraInfo,
    /// Handle-scoped relay between the group variable and this handle's
    /// listeners. `close` severs it in one step, and listeners registered
    /// afterwards never fire.
    relay: Arc<Mutex<ChangeEmitter>>,
    /// The single subscription this handle holds on the group variable.
    forward_sub: Subscription,
    closed: AtomicBool,
}

impl FilterHandle {
    pub fn new(registry: &Registry, group: impl Into<GroupSpec>) -> LinkResult<Self> {
        FilterHandle::with_extra(registry, group, ExtraInfo::new())
    }

    /// Create a handle whose `extra` entries are merged into every event it
    /// causes. A `"sender"` entry naming this handle is always present.
    pub fn with_extra(
        registry: &Registry,
        group: impl Into<GroupSpec>,
        mut extra: ExtraInfo,
    ) -> LinkResult<Self> {
        let group = registry.resolve(group.into())?;
        let filter_set = shared_filter_set(&group)?;
        let filter_var = group.var(FILTER_VAR)?;
        let id = HandleId::next();
        extra.insert("sender".to_owned(), Value::Text(id.to_string()));

        let relay = Arc::new(Mutex::new(ChangeEmitter::new()));
        let forward = Arc::clone(&relay);
        let forward_sub = filter_var.on_change(move |event| {
            let listeners = forward.lock().listeners(CHANGE_EVENT);
            for listener in listeners {
                listener(event);
            }
        });

        Ok(FilterHandle {
            id,
            group,
            filter_set,
            filter_var,
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

    /// Replace this handle's contribution with `keys` (already deduplicated
    /// by the caller; sorting is handled here) and publish the new
    /// aggregated value to the group. Ignored after `close`.
    pub fn set(&self, keys: &[Key], extra: Option<ExtraInfo>) -> LinkResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let value = {
            let mut filter_set = self.filter_set.lock();
            filter_set.update(self.id, Some(keys))?;
            Value::from_keys(filter_set.value().map(<[Key]>::to_vec))
        };
        self.publish(value, extra);
        Ok(())
    }

    /// Withdraw this handle's contribution and publish the new aggregated
    /// value. Ignored after `close` (which has already withdrawn it).
    pub fn clear(&self, extra: Option<ExtraInfo>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.withdraw(extra);
    }

    /// Keys currently visible through all handles, `None` while no filter is
    /// being applied.
    pub fn filtered_keys(&self) -> Option<Vec<Key>> {
        self.filter_set.lock().value().map(<[Key]>::to_vec)
    }

    /// Subscribe to changes of the group's aggregated filter value.
    /// Registrations land on this handle's relay, so they all go away with
    /// `close`; subscribing to a closed handle yields a dead subscription.
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

    /// Remove this handle's listeners and withdraw its contribution.
    /// Idempotent; other handles on the same group are unaffected, and
    /// further writes through this handle are ignored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(handle = %self.id, "closing filter handle");
        self.filter_var.off(&self.forward_sub);
        self.relay.lock().remove_all(CHANGE_EVENT);
        self.withdraw(None);
    }

    fn withdraw(&self, extra: Option<ExtraInfo>) {
        let value = {
            let mut filter_set = self.filter_set.lock();
            filter_set.clear(self.id);
            Value::from_keys(filter_set.value().map(<[Key]>::to_vec))
        };
        self.publish(value, extra);
    }

    // Filter-set lock is released by the caller before this runs, so
    // listeners may read the filter set during fan-out.
    fn publish(&self, value: Value, extra: Option<ExtraInfo>) {
        self.filter_var
            .set(value, Some(merge_extra(&self.extra, extra)));
    }
}

impl Drop for FilterHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkstate_core::keys;

    #[test]
    fn test_handles_share_filter_set_by_group_name() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g").unwrap();
        let h2 = FilterHandle::new(&registry, "g").unwrap();

        assert!(Arc::ptr_eq(&h1.filter_set, &h2.filter_set));

        h1.set(&keys(&[3i64, 5, 7]), None).unwrap();
        assert_eq!(h2.filtered_keys(), Some(keys(&[3i64, 5, 7])));

        h2.set(&keys(&[5i64, 7, 9]), None).unwrap();
        assert_eq!(h1.filtered_keys(), Some(keys(&[5i64, 7])));

        h1.close();
        h2.close();
    }

    #[test]
    fn test_distinct_groups_are_independent() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g1").unwrap();
        let h2 = FilterHandle::new(&registry, "g2").unwrap();

        h1.set(&keys(&["a"]), None).unwrap();
        assert_eq!(h2.filtered_keys(), None);
    }

    #[test]
    fn test_set_publishes_to_filter_variable() {
        let registry = Registry::new();
        let handle = FilterHandle::new(&registry, "g").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        handle.on_change(move |e| seen2.lock().push(e.clone()));

        handle.set(&keys(&["b", "a"]), None).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].old_value, Value::None);
        assert_eq!(seen[0].value, Value::Keys(keys(&["a", "b"])));
        assert_eq!(
            seen[0].extra.get("sender"),
            Some(&Value::Text(handle.id().to_string()))
        );
    }

    #[test]
    fn test_unchanged_aggregate_fires_no_event() {
        let registry = Registry::new();
        let handle = FilterHandle::new(&registry, "g").unwrap();
        handle.set(&keys(&["a"]), None).unwrap();

        let fired = Arc::new(Mutex::new(0u32));
        let fired2 = Arc::clone(&fired);
        handle.on_change(move |_| *fired2.lock() += 1);

        handle.set(&keys(&["a"]), None).unwrap();
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_close_removes_only_own_listeners() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g").unwrap();
        let h2 = FilterHandle::new(&registry, "g").unwrap();

        let fired1 = Arc::new(Mutex::new(0u32));
        let fired2 = Arc::new(Mutex::new(0u32));

        let f = Arc::clone(&fired1);
        h1.on_change(move |_| *f.lock() += 1);
        let f = Arc::clone(&fired2);
        h2.on_change(move |_| *f.lock() += 1);

        h1.set(&keys(&["a"]), None).unwrap();
        assert_eq!(*fired1.lock(), 1);
        assert_eq!(*fired2.lock(), 1);

        h1.close();
        // h1's contribution is withdrawn: aggregate reverts to "no filter",
        // which h2 still observes.
        assert_eq!(*fired2.lock(), 2);
        assert_eq!(h2.filtered_keys(), None);

        h2.set(&keys(&["b"]), None).unwrap();
        assert_eq!(*fired1.lock(), 1);
        assert_eq!(*fired2.lock(), 3);
    }

    #[test]
    fn test_close_is_idempotent() {
        let registry = Registry::new();
        let handle = FilterHandle::new(&registry, "g").unwrap();
        handle.set(&keys(&["a"]), None).unwrap();
        handle.close();
        handle.close();
        assert_eq!(handle.filtered_keys(), None);
    }

    #[test]
    fn test_writes_after_close_are_ignored() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g").unwrap();
        let h2 = FilterHandle::new(&registry, "g").unwrap();

        h1.set(&keys(&["a"]), None).unwrap();
        h1.close();
        assert_eq!(h2.filtered_keys(), None);

        // A closed handle can no longer narrow the shared filter, and its
        // stale contribution cannot be resurrected.
        h1.set(&keys(&["a"]), None).unwrap();
        assert_eq!(h2.filtered_keys(), None);
        h1.clear(None);
        assert_eq!(h2.filtered_keys(), None);

        drop(h1);
        assert_eq!(h2.filtered_keys(), None);
    }

    #[test]
    fn test_subscribe_after_close_never_fires() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g").unwrap();
        let h2 = FilterHandle::new(&registry, "g").unwrap();
        h1.close();

        let fired = Arc::new(Mutex::new(0u32));
        let f = Arc::clone(&fired);
        h1.on_change(move |_| *f.lock() += 1);

        h2.set(&keys(&["a"]), None).unwrap();
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_drop_releases_contribution() {
        let registry = Registry::new();
        let h1 = FilterHandle::new(&registry, "g").unwrap();
        let h2 = FilterHandle::new(&registry, "g").unwrap();

        h1.set(&keys(&["a"]), None).unwrap();
        h2.set(&keys(&["a", "b"]), None).unwrap();
        assert_eq!(h2.filtered_keys(), Some(keys(&["a"])));

        drop(h1);
        assert_eq!(h2.filtered_keys(), Some(keys(&["a", "b"])));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let registry = Registry::new();
        let handle = FilterHandle::new(&registry, "g").unwrap();
        assert!(handle.set(&keys(&["x", "x"]), None).is_err());
        assert_eq!(handle.filtered_keys(), None);
    }

    #[test]
    fn test_foreign_filterset_slot_is_error() {
        let registry = Registry::new();
        let group = registry.group("g").unwrap();
        group
            .var(FILTER_SET_VAR)
            .unwrap()
            .set(Value::Int(42), None);

        let err = FilterHandle::new(&registry, &group);
        assert!(matches!(err, Err(LinkError::NotAFilterSet)));
    }

    #[test]
    fn test_listener_may_read_filter_set_during_fanout() {
        let registry = Registry::new();
        let h1 = Arc::new(FilterHandle::new(&registry, "g").unwrap());
        let h2 = FilterHandle::new(&registry, "g").unwrap();

        let observed = Arc::new(Mutex::new(None));
        let observed2 = Arc::clone(&observed);
        let h1_reader = Arc::clone(&h1);
        h2.on_change(move |_| *observed2.lock() = h1_reader.filtered_keys());

        h1.set(&keys(&[1i64, 2]), None).unwrap();
        assert_eq!(*observed.lock(), Some(keys(&[1i64, 2])));
    }
}
