//! Probabilistic Linkage Engine — blocking, pairwise scoring, threshold
//! classification and transitive match closure.

use std::collections::{BTreeMap, BTreeSet};

use canonize_core::{grouping_key, normalize_identity, normalize_phone, Classification, MatchPair, RawRecord};

use crate::config::{BlockingConfig, MatcherMode, RunConfig, Thresholds};
use crate::rules;
use crate::score::{build_scorer, LinkageScorer};
use crate::unionfind::UnionFind;

/// Deduplicate the record set per the configured matcher.
///
/// Returns (scored pairs, cluster key per record, matcher mode actually
/// used, degraded flag). The degraded flag is set only when the
/// probabilistic scorer was requested but unavailable; the pipeline then
/// falls back to the rule-based matcher rather than failing the run.
pub fn deduplicate(
    config: &RunConfig,
    records: &[RawRecord],
) -> (Vec<MatchPair>, Vec<String>, MatcherMode, bool) {
    if config.matcher.mode == MatcherMode::Rules {
        return (Vec::new(), rules::cluster_by_identity(records), MatcherMode::Rules, false);
    }

    if records.len() < config.matcher.min_records {
        log::debug!(
            "{} record(s) below matcher.min_records={}; using rule-based matcher",
            records.len(),
            config.matcher.min_records
        );
        return (Vec::new(), rules::cluster_by_identity(records), MatcherMode::Rules, false);
    }

    let scorer = match build_scorer(&config.matcher) {
        Ok(scorer) => scorer,
        Err(e) => {
            log::warn!("{e}; falling back to rule-based matcher");
            return (Vec::new(), rules::cluster_by_identity(records), MatcherMode::Rules, true);
        }
    };

    let (pairs, keys) = link(records, scorer.as_ref(), config);
    (pairs, keys, MatcherMode::Probabilistic, false)
}

/// Classify a match probability against the configured thresholds.
pub fn classify(probability: f64, thresholds: &Thresholds) -> Classification {
    if probability >= thresholds.high {
        Classification::Match
    } else if probability >= thresholds.review {
        Classification::Review
    } else {
        Classification::Reject
    }
}

/// Score every in-block candidate pair and close match edges transitively.
///
/// Records must already be in the stable input order; blocks, candidate
/// pairs and partition outputs are all processed in pre-sorted order so
/// parallel and sequential execution produce identical results.
pub fn link(
    records: &[RawRecord],
    scorer: &dyn LinkageScorer,
    config: &RunConfig,
) -> (Vec<MatchPair>, Vec<String>) {
    let candidate_pairs = candidate_pairs(records, &config.matcher.blocking);

    let probabilities = score_pairs(records, &candidate_pairs, scorer, config.matcher.workers);

    let thresholds = &config.matcher.thresholds;
    let mut pairs = Vec::with_capacity(candidate_pairs.len());
    let mut uf = UnionFind::new(records.len());

    for (&(i, j), &probability) in candidate_pairs.iter().zip(probabilities.iter()) {
        let classification = classify(probability, thresholds);
        if classification == Classification::Match {
            // Only match edges merge; review edges wait for human review.
            uf.union(i, j);
        }
        pairs.push(MatchPair {
            record_a_id: records[i].qualified_id(),
            record_b_id: records[j].qualified_id(),
            match_probability: probability,
            classification,
        });
    }

    (pairs, cluster_keys(records, &mut uf))
}

/// Build candidate pairs from cheap blocking keys: normalized-name prefix,
/// normalized email hash, normalized phone hash. A record can appear in
/// several blocks; the pair set deduplicates.
fn candidate_pairs(records: &[RawRecord], config: &BlockingConfig) -> Vec<(usize, usize)> {
    let mut blocks: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        for key in blocking_keys(record, config.name_prefix_len) {
            blocks.entry(key).or_default().push(index);
        }
    }

    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (key, members) in &blocks {
        if members.len() > config.max_block_size {
            log::warn!(
                "block '{key}' has {} members (max {}); skipping pairwise scoring for it",
                members.len(),
                config.max_block_size
            );
            continue;
        }
        for (a, &i) in members.iter().enumerate() {
            for &j in &members[a + 1..] {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }

    pairs.into_iter().collect()
}

fn blocking_keys(record: &RawRecord, name_prefix_len: usize) -> Vec<String> {
    let mut keys = Vec::new();

    if let Some(ref name) = record.organization_name {
        let norm = normalize_identity(name);
        if !norm.is_empty() {
            let prefix: String = norm.chars().take(name_prefix_len).collect();
            keys.push(format!("n:{prefix}"));
        }
    }
    if let Some(ref email) = record.email {
        let norm = email.trim().to_lowercase();
        if !norm.is_empty() {
            keys.push(format!("e:{}", short_hash(&norm)));
        }
    }
    if let Some(ref phone) = record.phone {
        let digits = normalize_phone(phone);
        if digits.len() >= 7 {
            keys.push(format!("p:{}", short_hash(&digits)));
        }
    }

    keys
}

fn short_hash(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex()[..16].to_string()
}

/// Score pairs, optionally across worker threads. Partition outputs are
/// merged back in partition order, so the probability vector is identical
/// to sequential execution.
fn score_pairs(
    records: &[RawRecord],
    pairs: &[(usize, usize)],
    scorer: &dyn LinkageScorer,
    workers: usize,
) -> Vec<f64> {
    if workers <= 1 || pairs.len() < 2 {
        return pairs
            .iter()
            .map(|&(i, j)| scorer.score(&records[i], &records[j]).clamp(0.0, 1.0))
            .collect();
    }

    let chunk_size = pairs.len().div_ceil(workers);
    let chunks: Vec<&[(usize, usize)]> = pairs.chunks(chunk_size).collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&(i, j)| scorer.score(&records[i], &records[j]).clamp(0.0, 1.0))
                        .collect::<Vec<f64>>()
                })
            })
            .collect();

        let mut out = Vec::with_capacity(pairs.len());
        for handle in handles {
            // A panicking scorer is a defect, not a data-quality issue.
            match handle.join() {
                Ok(chunk) => out.extend(chunk),
                Err(_) => panic!("linkage scorer panicked in worker thread"),
            }
        }
        out
    })
}

/// Derive the cluster key for each record from its component
/// representative. The representative is the smallest record index in the
/// component (lexicographically smallest qualified id, since records are in
/// stable order); distinct components that happen to share a base key get a
/// positional discriminator so the linkage decision is preserved.
fn cluster_keys(records: &[RawRecord], uf: &mut UnionFind) -> Vec<String> {
    let reps = uf.representatives();

    let mut key_of_rep: BTreeMap<usize, String> = BTreeMap::new();
    let mut claimed: BTreeMap<String, usize> = BTreeMap::new();

    let mut sorted_reps: Vec<usize> = reps.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    sorted_reps.sort_unstable();

    for rep in sorted_reps {
        let base = grouping_key(&records[rep]);
        let n = claimed.entry(base.clone()).or_insert(0);
        *n += 1;
        let key = if *n == 1 { base } else { format!("{base}#{n}") };
        key_of_rep.insert(rep, key);
    }

    reps.iter().map(|rep| key_of_rep[rep].clone()).collect()
}
