//! Pairwise linkage scoring.
//!
//! The engine only depends on the narrow `LinkageScorer` trait; the shipped
//! default combines weighted field-level similarities deterministically. A
//! trained model can be substituted without touching blocking,
//! classification or aggregation.

use std::fmt;

use strsim::jaro_winkler;

use canonize_core::{normalize_identity, normalize_phone, RawRecord};

use crate::config::{MatcherConfig, Weights};

/// Scores one candidate pair into a probability in [0, 1].
pub trait LinkageScorer: Send + Sync + fmt::Debug {
    fn score(&self, a: &RawRecord, b: &RawRecord) -> f64;
}

/// The scorer implementation named in config cannot be constructed.
#[derive(Debug)]
pub enum ScorerError {
    Unavailable(String),
}

impl fmt::Display for ScorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(name) => write!(f, "linkage scorer '{name}' is not available"),
        }
    }
}

impl std::error::Error for ScorerError {}

/// Construct the configured scorer. Unknown names are an availability
/// failure the caller recovers from by degrading to the rule-based matcher.
pub fn build_scorer(config: &MatcherConfig) -> Result<Box<dyn LinkageScorer>, ScorerError> {
    match config.scorer.as_str() {
        "weighted" => Ok(Box::new(WeightedScorer {
            weights: config.weights.clone(),
        })),
        other => Err(ScorerError::Unavailable(other.to_string())),
    }
}

/// Deterministic weighted similarity over name, contact channels and
/// geography. Components with no comparable data on either side are
/// excluded from the weighted mean rather than counted as disagreement.
#[derive(Debug)]
pub struct WeightedScorer {
    pub weights: Weights,
}

impl LinkageScorer for WeightedScorer {
    fn score(&self, a: &RawRecord, b: &RawRecord) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        if let Some(sim) = name_similarity(a, b) {
            weighted_sum += self.weights.name * sim;
            weight_total += self.weights.name;
        }
        if let Some(sim) = contact_similarity(a, b) {
            weighted_sum += self.weights.contact * sim;
            weight_total += self.weights.contact;
        }
        if let Some(sim) = geo_similarity(a, b) {
            weighted_sum += self.weights.geo * sim;
            weight_total += self.weights.geo;
        }

        if weight_total <= 0.0 {
            return 0.0;
        }
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    }
}

fn name_similarity(a: &RawRecord, b: &RawRecord) -> Option<f64> {
    let left = normalize_identity(a.organization_name.as_deref()?);
    let right = normalize_identity(b.organization_name.as_deref()?);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some(jaro_winkler(&left, &right))
}

/// Exact match on any shared contact channel counts as full agreement;
/// comparable channels that all differ count as full disagreement.
fn contact_similarity(a: &RawRecord, b: &RawRecord) -> Option<f64> {
    let mut comparable = false;
    let mut agreed = false;

    if let (Some(ea), Some(eb)) = (a.email.as_deref(), b.email.as_deref()) {
        comparable = true;
        if ea.trim().to_lowercase() == eb.trim().to_lowercase() {
            agreed = true;
        }
    }
    if let (Some(pa), Some(pb)) = (a.phone.as_deref(), b.phone.as_deref()) {
        let (da, db) = (normalize_phone(pa), normalize_phone(pb));
        if !da.is_empty() && !db.is_empty() {
            comparable = true;
            if da == db {
                agreed = true;
            }
        }
    }

    if comparable {
        Some(if agreed { 1.0 } else { 0.0 })
    } else {
        None
    }
}

fn geo_similarity(a: &RawRecord, b: &RawRecord) -> Option<f64> {
    let province = match (a.province.as_deref(), b.province.as_deref()) {
        (Some(pa), Some(pb)) => {
            Some(if normalize_identity(pa) == normalize_identity(pb) { 1.0 } else { 0.0 })
        }
        _ => None,
    };
    let address = match (a.address.as_deref(), b.address.as_deref()) {
        (Some(aa), Some(ab)) => {
            let (na, nb) = (normalize_identity(aa), normalize_identity(ab));
            if na.is_empty() || nb.is_empty() {
                None
            } else {
                Some(jaro_winkler(&na, &nb))
            }
        }
        _ => None,
    };

    match (province, address) {
        (Some(p), Some(a)) => Some(0.5 * p + 0.5 * a),
        (Some(p), None) => Some(p),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> RawRecord {
        RawRecord {
            source_dataset: "src".into(),
            source_record_id: "1".into(),
            organization_name: name.map(String::from),
            email: email.map(String::from),
            phone: phone.map(String::from),
            website: None,
            province: None,
            address: None,
            status: None,
            extensions: BTreeMap::new(),
            source_priority: None,
            quality_score: 1.0,
            observed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            group_key: None,
        }
    }

    fn scorer() -> WeightedScorer {
        WeightedScorer { weights: Weights::default() }
    }

    #[test]
    fn identical_records_score_one() {
        let a = record(Some("Aero School"), Some("a@x.com"), Some("+2711000000"));
        let p = scorer().score(&a, &a.clone());
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_records_score_low() {
        let a = record(Some("Aero School"), Some("a@x.com"), None);
        let b = record(Some("Zebra Mining"), Some("z@y.org"), None);
        assert!(scorer().score(&a, &b) < 0.5);
    }

    #[test]
    fn missing_components_are_excluded_not_penalized() {
        // Same name, no contact/geo data on either side: probability is the
        // pure name similarity, not dragged down by absent fields.
        let a = record(Some("Aero School"), None, None);
        let b = record(Some("aero school"), None, None);
        let p = scorer().score(&a, &b);
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shared_phone_lifts_score() {
        let a = record(Some("Aero School"), None, Some("+27 11 000 0000"));
        let b = record(Some("Aero School Inc"), None, Some("0027110000000"));
        let without = scorer().score(
            &record(Some("Aero School"), None, None),
            &record(Some("Aero School Inc"), None, None),
        );
        let with = scorer().score(&a, &b);
        assert!(with > without);
    }

    #[test]
    fn conflicting_contacts_lower_score() {
        let same_name_no_contact = scorer().score(
            &record(Some("Aero School"), None, None),
            &record(Some("Aero School"), None, None),
        );
        let same_name_diff_email = scorer().score(
            &record(Some("Aero School"), Some("a@x.com"), None),
            &record(Some("Aero School"), Some("b@y.org"), None),
        );
        assert!(same_name_diff_email < same_name_no_contact);
    }

    #[test]
    fn score_is_symmetric_and_bounded() {
        let a = record(Some("Aero School"), Some("a@x.com"), None);
        let b = record(Some("Aero Schol"), Some("a@x.com"), Some("+2711000000"));
        let ab = scorer().score(&a, &b);
        let ba = scorer().score(&b, &a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn no_comparable_data_scores_zero() {
        let a = record(None, None, None);
        let b = record(None, None, None);
        assert_eq!(scorer().score(&a, &b), 0.0);
    }

    #[test]
    fn build_scorer_default() {
        let config = MatcherConfig::default();
        assert!(build_scorer(&config).is_ok());
    }

    #[test]
    fn build_scorer_unknown_is_unavailable() {
        let config = MatcherConfig {
            scorer: "trained-xgb".into(),
            ..MatcherConfig::default()
        };
        let err = build_scorer(&config).unwrap_err();
        assert!(err.to_string().contains("trained-xgb"));
    }
}
