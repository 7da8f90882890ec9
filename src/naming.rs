//! Logical server name resolution
//!
//! Snapshot names encode a logical server name plus a lineage marker:
//! `{name}-{epochMillis}` for snapshots created by this engine, or an
//! arbitrary suffix for snapshots created by hand (legacy scheme).
//!
//! The canonical convention used everywhere in this crate:
//!
//! - identity: the logical name is the text before the **first** separator,
//! - ordering: the trailing timestamp is parsed from after the **last**
//!   separator, and is used only by the ordering policy.
//!
//! Droplet names are expected to equal a logical name exactly.

use chrono::{DateTime, Utc};

/// Separator between a logical name and its lineage marker
pub const LINEAGE_SEPARATOR: char = '-';

/// Derive the logical server name from a raw resource name.
///
/// Everything before the first separator; the whole name when no separator
/// is present.
pub fn logical_name(resource_name: &str) -> &str {
    match resource_name.split_once(LINEAGE_SEPARATOR) {
        Some((name, _)) => name,
        None => resource_name,
    }
}

/// Check whether a resource name belongs to a logical server name.
///
/// True iff the resource name equals the logical name exactly, or begins
/// with the logical name followed by the separator. `"web"` therefore
/// matches `"web"` and `"web-1700000000000"` but never `"web2"`.
pub fn matches(resource_name: &str, logical: &str) -> bool {
    match resource_name.strip_prefix(logical) {
        Some("") => true,
        Some(rest) => rest.starts_with(LINEAGE_SEPARATOR),
        None => false,
    }
}

/// Extract the trailing numeric timestamp from a resource name.
///
/// Parses the text after the last separator; `None` when the name has no
/// separator or the suffix is not an integer.
pub fn timestamp_suffix(resource_name: &str) -> Option<i64> {
    let (_, suffix) = resource_name.rsplit_once(LINEAGE_SEPARATOR)?;
    suffix.parse().ok()
}

/// Deterministic snapshot name for a server ended at `at`.
pub fn snapshot_name_for(logical: &str, at: DateTime<Utc>) -> String {
    format!("{}{}{}", logical, LINEAGE_SEPARATOR, at.timestamp_millis())
}
