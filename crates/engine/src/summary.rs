//! Run summary computation.

use canonize_core::{CanonicalRecord, Classification, ConflictLogEntry, MatchPair};

use crate::model::RunSummary;

pub fn compute_summary(
    input_records: usize,
    canonical: &[CanonicalRecord],
    conflicts: &[ConflictLogEntry],
    pairs: &[MatchPair],
    malformed_values: usize,
    degraded_matcher: bool,
) -> RunSummary {
    let mut matches = 0;
    let mut review = 0;
    let mut reject = 0;
    for pair in pairs {
        match pair.classification {
            Classification::Match => matches += 1,
            Classification::Review => review += 1,
            Classification::Reject => reject += 1,
        }
    }

    RunSummary {
        input_records,
        canonical_records: canonical.len(),
        conflicts: conflicts.len(),
        malformed_values,
        pairs_scored: pairs.len(),
        matches,
        review,
        reject,
        degraded_matcher,
    }
}
