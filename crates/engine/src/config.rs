use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub registry: Option<RegistrySection>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// Higher priority wins field conflicts. Sources without a priority rank
    /// below every source that has one.
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub columns: ColumnMapping,
}

/// Maps input CSV headers to the declared schema. Unset declared-field
/// columns default to a header with the same name; a missing header just
/// leaves the field null. `record_id` is the only required column.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_record_id")]
    pub record_id: String,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub quality_score: Option<String>,
    #[serde(default)]
    pub observed_at: Option<String>,
    #[serde(default)]
    pub group_key: Option<String>,
}

impl ColumnMapping {
    /// Column name to read for a declared field.
    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        let explicit = match field {
            "organization_name" => &self.organization_name,
            "email" => &self.email,
            "phone" => &self.phone,
            "website" => &self.website,
            "province" => &self.province,
            "address" => &self.address,
            "status" => &self.status,
            _ => &None,
        };
        explicit.as_deref().unwrap_or(field)
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            record_id: default_record_id(),
            organization_name: None,
            email: None,
            phone: None,
            website: None,
            province: None,
            address: None,
            status: None,
            quality_score: None,
            observed_at: None,
            group_key: None,
        }
    }
}

fn default_record_id() -> String {
    "record_id".into()
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub mode: MatcherMode,
    /// Scorer implementation name. "weighted" is the built-in default; an
    /// unknown name degrades to the rule-based matcher with a warning.
    #[serde(default = "default_scorer")]
    pub scorer: String,
    /// Below this many records, probabilistic scoring is skipped in favour
    /// of the rule-based matcher.
    #[serde(default = "default_min_records")]
    pub min_records: usize,
    /// Worker threads for block scoring. 1 = sequential. Parallel and
    /// sequential execution produce identical output.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub blocking: BlockingConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            mode: MatcherMode::default(),
            scorer: default_scorer(),
            min_records: default_min_records(),
            workers: default_workers(),
            thresholds: Thresholds::default(),
            weights: Weights::default(),
            blocking: BlockingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherMode {
    Rules,
    Probabilistic,
}

impl Default for MatcherMode {
    fn default() -> Self {
        Self::Probabilistic
    }
}

impl std::fmt::Display for MatcherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rules => write!(f, "rules"),
            Self::Probabilistic => write!(f, "probabilistic"),
        }
    }
}

/// Classification thresholds: probability ≥ `high` ⇒ match,
/// `review` ≤ probability < `high` ⇒ review, below ⇒ reject.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Thresholds {
    pub review: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { review: 0.70, high: 0.90 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Weights {
    pub name: f64,
    pub contact: f64,
    pub geo: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { name: 0.5, contact: 0.3, geo: 0.2 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockingConfig {
    /// Leading characters of the normalized name forming the name block.
    #[serde(default = "default_prefix_len")]
    pub name_prefix_len: usize,
    /// Blocks larger than this are skipped (with a warning) rather than
    /// scored quadratically.
    #[serde(default = "default_max_block")]
    pub max_block_size: usize,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            name_prefix_len: default_prefix_len(),
            max_block_size: default_max_block(),
        }
    }
}

fn default_scorer() -> String {
    "weighted".into()
}

fn default_min_records() -> usize {
    2
}

fn default_workers() -> usize {
    1
}

fn default_prefix_len() -> usize {
    4
}

fn default_max_block() -> usize {
    500
}

// ---------------------------------------------------------------------------
// Registry + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    pub path: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let t = &self.matcher.thresholds;
        if !(0.0..=1.0).contains(&t.review) || !(0.0..=1.0).contains(&t.high) {
            return Err(EngineError::ConfigValidation(format!(
                "thresholds must lie in [0, 1], got review={} high={}",
                t.review, t.high
            )));
        }
        if t.review > t.high {
            return Err(EngineError::ConfigValidation(format!(
                "thresholds must satisfy review <= high, got review={} high={}",
                t.review, t.high
            )));
        }

        let w = &self.matcher.weights;
        if w.name < 0.0 || w.contact < 0.0 || w.geo < 0.0 {
            return Err(EngineError::ConfigValidation(
                "weights must be non-negative".into(),
            ));
        }
        if w.name + w.contact + w.geo <= 0.0 {
            return Err(EngineError::ConfigValidation(
                "at least one weight must be positive".into(),
            ));
        }

        if self.matcher.blocking.name_prefix_len == 0 {
            return Err(EngineError::ConfigValidation(
                "blocking.name_prefix_len must be at least 1".into(),
            ));
        }

        if self.matcher.workers == 0 {
            return Err(EngineError::ConfigValidation(
                "matcher.workers must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Nightly merge"

[sources.crm]
file = "crm.csv"
priority = 3

[sources.signups]
file = "signups.csv"
priority = 1
[sources.signups.columns]
record_id = "id"
organization_name = "org"

[matcher]
mode = "probabilistic"
min_records = 2

[matcher.thresholds]
review = 0.70
high = 0.90

[registry]
path = "registry.db"
"#;

    #[test]
    fn parse_valid() {
        let config = RunConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Nightly merge");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources["crm"].priority, Some(3));
        assert_eq!(config.matcher.thresholds.review, 0.70);
        assert_eq!(config.matcher.thresholds.high, 0.90);
        assert_eq!(config.registry.as_ref().unwrap().max_retries, 3);
    }

    #[test]
    fn column_mapping_defaults_to_field_name() {
        let config = RunConfig::from_toml(VALID).unwrap();
        let crm = &config.sources["crm"].columns;
        assert_eq!(crm.record_id, "record_id");
        assert_eq!(crm.column_for("organization_name"), "organization_name");

        let signups = &config.sources["signups"].columns;
        assert_eq!(signups.record_id, "id");
        assert_eq!(signups.column_for("organization_name"), "org");
        assert_eq!(signups.column_for("email"), "email");
    }

    #[test]
    fn reject_inverted_thresholds() {
        let input = r#"
name = "Bad"
[matcher.thresholds]
review = 0.9
high = 0.7
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("review <= high"));
    }

    #[test]
    fn reject_out_of_range_thresholds() {
        let input = r#"
name = "Bad"
[matcher.thresholds]
review = -0.1
high = 0.9
"#;
        assert!(RunConfig::from_toml(input).is_err());

        let input = r#"
name = "Bad"
[matcher.thresholds]
review = 0.5
high = 1.5
"#;
        assert!(RunConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_negative_weights() {
        let input = r#"
name = "Bad"
[matcher.weights]
name = -1.0
contact = 0.3
geo = 0.2
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn reject_zero_prefix() {
        let input = r#"
name = "Bad"
[matcher.blocking]
name_prefix_len = 0
"#;
        assert!(RunConfig::from_toml(input).is_err());
    }

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::from_toml(r#"name = "Defaults""#).unwrap();
        assert_eq!(config.matcher.mode, MatcherMode::Probabilistic);
        assert_eq!(config.matcher.scorer, "weighted");
        assert_eq!(config.matcher.workers, 1);
        assert!(config.registry.is_none());
    }
}
