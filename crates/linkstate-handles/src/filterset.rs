//! Filter set - the multi-writer intersection aggregator
//!
//! Each registered handle contributes a key list (or no restriction). The
//! derived value is the intersection of all restricting contributions,
//! maintained incrementally: an update touches only the diff between the
//! handle's previous and new list, not the whole key universe. Updates can
//! fire on every user interaction, so per-update cost must stay near the
//! diff size.

use std::collections::{BTreeMap, HashMap};

use linkstate_core::{Key, LinkResult};

use crate::{diff_sorted_lists, HandleId};

/// Intersection aggregator over a dynamic set of contributing handles.
#[derive(Debug, Default)]
pub struct FilterSet {
    /// Last stored key list per handle; `None` means the handle is
    /// registered but currently restricts nothing.
    handles: HashMap<HandleId, Option<Vec<Key>>>,
    /// Key -> number of restricting handles that include it. Zero-count
    /// entries are pruned, so iteration covers the full known key set.
    counts: BTreeMap<Key, usize>,
    /// Derived intersection, `None` while no handle is registered.
    value: Option<Vec<Key>>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet::default()
    }

    /// Clear all state back to the empty condition.
    pub fn reset(&mut self) {
        self.handles.clear();
        self.counts.clear();
        self.value = None;
    }

    /// The current intersection: `None` while no handle is registered,
    /// otherwise the ascending list of keys every restricting handle
    /// includes.
    pub fn value(&self) -> Option<&[Key]> {
        self.value.as_deref()
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Replace a handle's contribution.
    ///
    /// `keys` is defensively copied and sorted, so input order never affects
    /// the result; the caller guarantees it is duplicate free (duplicates
    /// survive sorting and are rejected by the diff validation before any
    /// state is touched). `None` registers the handle without restricting
    /// the intersection.
    pub fn update(&mut self, id: HandleId, keys: Option<&[Key]>) -> LinkResult<()> {
        let sorted = keys.map(|keys| {
            let mut sorted = keys.to_vec();
            sorted.sort();
            sorted
        });

        let previous = self
            .handles
            .get(&id)
            .and_then(|stored| stored.as_deref())
            .unwrap_or(&[]);
        let diff = diff_sorted_lists(previous, sorted.as_deref().unwrap_or(&[]))?;

        tracing::trace!(
            handle = %id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "filter set update"
        );

        self.handles.insert(id, sorted);
        for key in diff.added {
            *self.counts.entry(key).or_insert(0) += 1;
        }
        for key in &diff.removed {
            self.decrement(key);
        }
        self.recompute();
        Ok(())
    }

    /// Drop a handle's contribution and registration entirely. No-op for a
    /// handle that never updated.
    pub fn clear(&mut self, id: HandleId) {
        let Some(stored) = self.handles.remove(&id) else {
            return;
        };
        for key in &stored.unwrap_or_default() {
            self.decrement(key);
        }
        self.recompute();
    }

    fn decrement(&mut self, key: &Key) {
        if let Some(count) = self.counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(key);
            }
        }
    }

    // Recompute over the full known key set. Scanning a superset hint
    // instead would be a pure optimization, not a behavioral requirement.
    fn recompute(&mut self) {
        if self.handles.is_empty() {
            self.value = None;
            return;
        }
        let restricting = self
            .handles
            .values()
            .filter(|stored| stored.is_some())
            .count();
        let value = if restricting == 0 {
            Vec::new()
        } else {
            self.counts
                .iter()
                .filter(|(_, &count)| count == restricting)
                .map(|(key, _)| key.clone())
                .collect()
        };
        self.value = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkstate_core::keys;

    #[test]
    fn test_intersection_lifecycle() {
        let mut fs = FilterSet::new();
        let h1 = HandleId::next();
        let h2 = HandleId::next();

        assert_eq!(fs.value(), None);

        fs.update(h1, Some(keys(&[3i64, 5, 7]).as_slice())).unwrap();
        assert_eq!(fs.value(), Some(keys(&[3i64, 5, 7]).as_slice()));

        fs.update(h2, Some(keys(&[5i64, 7, 9]).as_slice())).unwrap();
        assert_eq!(fs.value(), Some(keys(&[5i64, 7]).as_slice()));

        // Empty intersection is distinct from "no filter".
        fs.update(h2, Some([].as_slice())).unwrap();
        assert_eq!(fs.value(), Some(&[] as &[Key]));

        fs.clear(h2);
        assert_eq!(fs.value(), Some(keys(&[3i64, 5, 7]).as_slice()));

        fs.clear(h1);
        assert_eq!(fs.value(), None);
    }

    #[test]
    fn test_update_sorts_input() {
        let mut fs = FilterSet::new();
        let h = HandleId::next();
        fs.update(h, Some(keys(&["c", "a", "b"]).as_slice())).unwrap();
        assert_eq!(fs.value(), Some(keys(&["a", "b", "c"]).as_slice()));
    }

    #[test]
    fn test_duplicate_input_fails_without_mutation() {
        let mut fs = FilterSet::new();
        let h = HandleId::next();
        fs.update(h, Some(keys(&["a", "b"]).as_slice())).unwrap();

        let err = fs.update(h, Some(keys(&["x", "x"]).as_slice()));
        assert!(err.is_err());
        // Prior contribution is untouched.
        assert_eq!(fs.value(), Some(keys(&["a", "b"]).as_slice()));
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn test_clear_unknown_handle_is_noop() {
        let mut fs = FilterSet::new();
        fs.clear(HandleId::next());
        assert_eq!(fs.value(), None);

        let h = HandleId::next();
        fs.update(h, Some(keys(&[1i64]).as_slice())).unwrap();
        fs.clear(HandleId::next());
        assert_eq!(fs.value(), Some(keys(&[1i64]).as_slice()));
    }

    #[test]
    fn test_unrestricted_contribution() {
        let mut fs = FilterSet::new();
        let h1 = HandleId::next();
        let h2 = HandleId::next();

        fs.update(h1, None).unwrap();
        // Registered but restricting nothing: no keys are known.
        assert_eq!(fs.value(), Some(&[] as &[Key]));

        fs.update(h2, Some(keys(&[1i64, 2]).as_slice())).unwrap();
        // The unrestricted handle does not narrow the intersection.
        assert_eq!(fs.value(), Some(keys(&[1i64, 2]).as_slice()));

        fs.update(h1, Some(keys(&[2i64, 3]).as_slice())).unwrap();
        assert_eq!(fs.value(), Some(keys(&[2i64]).as_slice()));
    }

    #[test]
    fn test_reset() {
        let mut fs = FilterSet::new();
        let h = HandleId::next();
        fs.update(h, Some(keys(&[1i64, 2]).as_slice())).unwrap();
        fs.reset();
        assert_eq!(fs.value(), None);
        assert!(fs.is_empty());
    }

    #[test]
    fn test_mixed_key_types_order() {
        let mut fs = FilterSet::new();
        let h = HandleId::next();
        let list = [Key::from("a"), Key::from(10), Key::from(2)];
        fs.update(h, Some(list.as_slice())).unwrap();
        assert_eq!(
            fs.value(),
            Some(vec![Key::from(2), Key::from(10), Key::from("a")].as_slice())
        );
    }
}
