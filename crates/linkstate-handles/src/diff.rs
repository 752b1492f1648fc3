//! Sorted-list diffing
//!
//! Every filter-set update is driven by the diff between a handle's previous
//! and new key list. An off-by-one here silently corrupts the shared count
//! table with no further self-check, so both inputs are validated before
//! anything else happens.

use std::cmp::Ordering;

use linkstate_core::{LinkError, LinkResult};

/// Added/removed partition of two strictly increasing lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortedDiff<T> {
    /// Present in the new list only, ascending.
    pub added: Vec<T>,
    /// Present in the old list only, ascending.
    pub removed: Vec<T>,
}

/// Fail unless `list` is strictly increasing (sorted, no duplicates).
pub fn check_sorted<T: Ord>(list: &[T]) -> LinkResult<()> {
    for i in 1..list.len() {
        if list[i] <= list[i - 1] {
            return Err(LinkError::UnsortedList { index: i });
        }
    }
    Ok(())
}

/// Diff two strictly increasing lists with a two-pointer merge walk.
///
/// Equal elements are consumed from both sides and appear in neither output;
/// once one side is exhausted the other's suffix is appended wholesale.
pub fn diff_sorted_lists<T: Ord + Clone>(a: &[T], b: &[T]) -> LinkResult<SortedDiff<T>> {
    check_sorted(a)?;
    check_sorted(b)?;

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        match a[i_a].cmp(&b[i_b]) {
            Ordering::Equal => {
                i_a += 1;
                i_b += 1;
            }
            Ordering::Less => {
                removed.push(a[i_a].clone());
                i_a += 1;
            }
            Ordering::Greater => {
                added.push(b[i_b].clone());
                i_b += 1;
            }
        }
    }

    removed.extend(a[i_a..].iter().cloned());
    added.extend(b[i_b..].iter().cloned());

    Ok(SortedDiff { added, removed })
}
