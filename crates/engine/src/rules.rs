//! Rule-Based Matcher — exact normalized-identity deduplication.
//!
//! The safe degraded mode: it trades recall for precision and merges only
//! records whose normalized identity strings are exactly equal, so it can
//! never produce a false cross-entity merge. Used when the probabilistic
//! engine is disabled, unavailable, or the input is too small to score
//! reliably.

use canonize_core::{grouping_key, RawRecord};

/// Assign each record its cluster key: explicit group key, else normalized
/// organization name, else normalized province|address composite, else the
/// record's own qualified id. Never fails on malformed input.
pub fn cluster_by_identity(records: &[RawRecord]) -> Vec<String> {
    records.iter().map(grouping_key).collect()
}
