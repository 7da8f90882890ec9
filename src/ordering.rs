//! Snapshot ordering policy
//!
//! One total, newest-first order over snapshots, applied identically wherever
//! snapshots are ranked: latest-selection for start, list grouping, snapshot
//! listings, and retention cutoffs. Total and deterministic so that "latest"
//! and keep/delete partitions never depend on listing order.

use crate::client::Snapshot;
use crate::naming::timestamp_suffix;
use std::cmp::Ordering;

/// Compare two snapshots, most recent first.
///
/// 1. `created_at` descending.
/// 2. Trailing numeric timestamp descending, when both names carry one.
/// 3. `name` descending, as the final total-order tie-break.
pub fn newest_first(a: &Snapshot, b: &Snapshot) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| suffix_order(a, b))
        .then_with(|| b.name.cmp(&a.name))
}

fn suffix_order(a: &Snapshot, b: &Snapshot) -> Ordering {
    match (timestamp_suffix(&a.name), timestamp_suffix(&b.name)) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        // Absent or unparseable suffixes are not comparable by this rule.
        _ => Ordering::Equal,
    }
}

/// Sort a snapshot collection in place, most recent first.
pub fn sort_newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(newest_first);
}
