//! Typed synchronous publish/subscribe
//!
//! `ChangeEmitter` groups listeners by event type and fans triggered events
//! out synchronously, in subscription order. Subscriptions are cancelled by
//! returning the opaque token handed out by `on`; there is no cancellation by
//! listener identity.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::Value;

/// The only event type named variables emit.
pub const CHANGE_EVENT: &str = "change";

/// Extra metadata carried on emitted events, keyed by property name.
pub type ExtraInfo = BTreeMap<String, Value>;

/// Merge call-supplied extras over handle defaults; call-supplied keys win.
pub fn merge_extra(defaults: &ExtraInfo, extra: Option<ExtraInfo>) -> ExtraInfo {
    match extra {
        None => defaults.clone(),
        Some(extra) => {
            let mut merged = defaults.clone();
            merged.extend(extra);
            merged
        }
    }
}

/// Payload delivered to change listeners.
///
/// `old_value` and `value` are dedicated fields, so extra metadata can never
/// mask them.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub old_value: Value,
    pub value: Value,
    pub extra: ExtraInfo,
}

impl ChangeEvent {
    pub fn new(old_value: Value, value: Value, extra: ExtraInfo) -> Self {
        ChangeEvent {
            old_value,
            value,
            extra,
        }
    }
}

/// Shared listener callback.
pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Opaque subscription token. Unique within the emitter that issued it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    event_type: String,
    seq: u64,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({}:{})", self.event_type, self.seq)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.seq)
    }
}

/// Minimal typed publish/subscribe primitive.
#[derive(Default)]
pub struct ChangeEmitter {
    /// Listeners per event type, in subscription order.
    types: HashMap<String, Vec<(u64, Listener)>>,
    seq: u64,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        ChangeEmitter::default()
    }

    /// Register a listener. Returns the token that cancels it.
    pub fn on(
        &mut self,
        event_type: &str,
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let seq = self.seq;
        self.seq += 1;
        self.types
            .entry(event_type.to_owned())
            .or_default()
            .push((seq, Arc::new(listener)));
        Subscription {
            event_type: event_type.to_owned(),
            seq,
        }
    }

    /// Cancel a subscription. Returns false if it was already gone.
    pub fn off(&mut self, sub: &Subscription) -> bool {
        let Some(listeners) = self.types.get_mut(&sub.event_type) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(seq, _)| *seq != sub.seq);
        before != listeners.len()
    }

    /// Number of listeners currently registered for an event type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.types.get(event_type).map_or(0, Vec::len)
    }

    /// Snapshot of the current listeners, in subscription order.
    ///
    /// Callers that hold the emitter behind a lock take the snapshot, release
    /// the lock, and then fan out, so listeners may re-enter the emitter.
    pub fn listeners(&self, event_type: &str) -> Vec<Listener> {
        self.types
            .get(event_type)
            .map(|subs| subs.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Remove every listener registered for an event type.
    pub fn remove_all(&mut self, event_type: &str) {
        self.types.remove(event_type);
    }

    /// Fan out synchronously, in subscription order.
    ///
    /// Fans out over a `listeners` snapshot, so the set of registered
    /// listeners may change mid-flight without invalidating the iteration.
    /// Callers that keep the emitter behind a lock must not hold it across
    /// `trigger`: take `listeners` under the lock, release it, then invoke
    /// the snapshot, or a listener re-entering `on`/`off` will deadlock.
    pub fn trigger(&self, event_type: &str, event: &ChangeEvent) {
        for listener in self.listeners(event_type) {
            listener(event);
        }
    }
}

impl fmt::Debug for ChangeEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .types
            .iter()
            .map(|(ty, subs)| (ty.as_str(), subs.len()))
            .collect();
        f.debug_struct("ChangeEmitter")
            .field("listeners", &counts)
            .field("seq", &self.seq)
            .finish()
    }
}
