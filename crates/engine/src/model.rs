//! Run output types.

use serde::Serialize;

use canonize_core::{CanonicalRecord, ConflictLogEntry, MatchPair};

use crate::config::{MatcherMode, Thresholds};

/// Provenance stamp for a run, embedded in every metadata artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    /// The matcher mode actually used, which may differ from the configured
    /// mode when the run degraded.
    pub matcher_mode: MatcherMode,
    pub degraded_matcher: bool,
    pub thresholds: Thresholds,
}

/// Headline counts for operator summaries and the metadata artifact.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub input_records: usize,
    pub canonical_records: usize,
    pub conflicts: usize,
    pub malformed_values: usize,
    pub pairs_scored: usize,
    pub matches: usize,
    pub review: usize,
    pub reject: usize,
    pub degraded_matcher: bool,
}

/// Complete output of one engine run.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub canonical: Vec<CanonicalRecord>,
    pub conflicts: Vec<ConflictLogEntry>,
    pub pairs: Vec<MatchPair>,
}

impl RunResult {
    /// Pairs awaiting a human verdict.
    pub fn review_pairs(&self) -> impl Iterator<Item = &MatchPair> {
        self.pairs
            .iter()
            .filter(|p| p.classification == canonize_core::Classification::Review)
    }
}
