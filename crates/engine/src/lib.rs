//! `canonize-engine` — aggregation, conflict-resolution and entity-linkage.
//!
//! Pure engine crate: receives pre-loaded records, returns canonical records,
//! conflict log, match pairs and a run summary. No CLI, network or storage
//! dependencies.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod linkage;
pub mod model;
pub mod progress;
pub mod rules;
pub mod score;
pub mod select;
pub mod summary;
pub mod unionfind;

pub use config::{MatcherMode, RunConfig, Thresholds};
pub use error::EngineError;
pub use model::{RunMeta, RunResult, RunSummary};
pub use progress::ProgressListener;
pub use score::LinkageScorer;

use canonize_core::{RawRecord, DECLARED_FIELDS};

use crate::aggregate::MalformedValue;

/// Run the full pipeline: sanitize → deduplicate → aggregate → summarize.
///
/// Records are re-sequenced into a stable order (lexicographic qualified id)
/// before anything else, so the output is a pure function of the record set:
/// any physical permutation of the same records produces byte-identical
/// results.
pub fn run(
    config: &RunConfig,
    records: &[RawRecord],
    listener: Option<&dyn ProgressListener>,
) -> Result<RunResult, EngineError> {
    config.validate()?;

    let mut recs: Vec<RawRecord> = records.to_vec();
    recs.sort_by(|a, b| a.qualified_id().cmp(&b.qualified_id()));

    let malformed = sanitize(&mut recs);

    let (pairs, cluster_keys, mode_used, degraded) = linkage::deduplicate(config, &recs);

    let (canonical, conflicts) =
        aggregate::aggregate(&recs, &cluster_keys, &malformed, listener);

    let summary = summary::compute_summary(
        records.len(),
        &canonical,
        &conflicts,
        &pairs,
        malformed.len(),
        degraded,
    );

    Ok(RunResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            matcher_mode: mode_used,
            degraded_matcher: degraded,
            thresholds: config.matcher.thresholds.clone(),
        },
        summary,
        canonical,
        conflicts,
        pairs,
    })
}

/// Coerce malformed declared-field values to null, collecting each one for
/// the conflict log. Never fails: data-quality problems are recoverable by
/// contract.
fn sanitize(records: &mut [RawRecord]) -> Vec<MalformedValue> {
    let mut malformed = Vec::new();

    for (index, record) in records.iter_mut().enumerate() {
        record.quality_score = record.quality_score.clamp(0.0, 1.0);

        for (field, kind) in DECLARED_FIELDS {
            let Some(value) = record.field(field) else { continue };
            if !kind_accepts(*kind, value) {
                malformed.push(MalformedValue {
                    record_index: index,
                    field: (*field).to_string(),
                    value: value.to_string(),
                    source_dataset: record.source_dataset.clone(),
                });
                record.set_field(field, None);
            }
        }
    }

    malformed
}

fn kind_accepts(kind: canonize_core::FieldKind, value: &str) -> bool {
    use canonize_core::FieldKind;
    let v = value.trim();
    match kind {
        FieldKind::Text => true,
        FieldKind::Email => {
            // One '@' with non-empty local part and a dotted domain.
            let mut parts = v.splitn(2, '@');
            match (parts.next(), parts.next()) {
                (Some(local), Some(domain)) => {
                    !local.is_empty()
                        && !domain.is_empty()
                        && domain.contains('.')
                        && !domain.starts_with('.')
                        && !domain.ends_with('.')
                        && !v.contains(char::is_whitespace)
                }
                _ => false,
            }
        }
        FieldKind::Phone => {
            let digits = canonize_core::normalize_phone(v);
            digits.len() >= 7 && digits.chars().all(|c| c.is_ascii_digit())
        }
        FieldKind::Url => {
            v.starts_with("http://") || v.starts_with("https://") || {
                // Bare domains are accepted; spaces are not.
                v.contains('.') && !v.contains(char::is_whitespace)
            }
        }
    }
}
