//! `canonize run` / `canonize validate` — config-driven pipeline execution.

use std::path::{Path, PathBuf};

use canonize_engine::{EngineError, ProgressListener, RunConfig, RunResult};
use canonize_registry::{RegistryError, RegistryStore};
use canonize_review_client::{build_task, ReviewClient};

use crate::exit_codes::{
    EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_REGISTRY_CONFLICT, EXIT_REGISTRY_INVARIANT,
};
use crate::CliError;

fn cli_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn config_err(e: &EngineError) -> CliError {
    CliError {
        code: EXIT_CONFIG,
        message: e.to_string(),
        hint: Some("run `canonize validate <config>` to check the config".into()),
    }
}

/// Log-based progress reporting for long aggregations.
struct LogProgress;

impl ProgressListener for LogProgress {
    fn on_started(&self, total: usize) {
        log::info!("aggregating {total} entity group(s)");
    }

    fn on_group(&self, key: &str, index: usize, total: usize) {
        if total >= 100 && (index + 1) % 100 == 0 {
            log::info!("aggregated {}/{total} groups (at '{key}')", index + 1);
        }
    }

    fn on_completed(&self, count: usize) {
        log::info!("aggregation complete: {count} canonical record(s)");
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| cli_err(EXIT_INPUT, format!("cannot read config: {e}")))?;

    let config = RunConfig::from_toml(&config_str).map_err(|e| config_err(&e))?;

    eprintln!(
        "config '{}' is valid: {} source(s), matcher mode {}",
        config.name,
        config.sources.len(),
        config.matcher.mode,
    );
    Ok(())
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_dir: Option<PathBuf>,
    skip_registry: bool,
    skip_review: bool,
    strict_review: bool,
) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| cli_err(EXIT_INPUT, format!("cannot read config: {e}")))?;
    let config = RunConfig::from_toml(&config_str).map_err(|e| config_err(&e))?;

    // File paths resolve relative to the config file's directory.
    let base_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let records = canonize_io::load_sources(&config, &base_dir)
        .map_err(|e| cli_err(EXIT_INPUT, e.to_string()))?;
    log::info!("loaded {} record(s) from {} source(s)", records.len(), config.sources.len());

    let result = canonize_engine::run(&config, &records, Some(&LogProgress))
        .map_err(|e| config_err(&e))?;

    if !skip_registry {
        sync_registry(&config, &base_dir, &result)?;
    }

    let out_dir = output_dir.unwrap_or_else(|| {
        let dir = config.output.dir.as_deref().unwrap_or("out");
        base_dir.join(dir)
    });
    canonize_io::write_artifacts(&out_dir, &result)
        .map_err(|e| cli_err(EXIT_ERROR, e.to_string()))?;
    eprintln!("wrote artifacts to {}", out_dir.display());

    if !skip_review {
        if let Err(msg) = submit_review_tasks(&result, &records) {
            if strict_review {
                return Err(cli_err(crate::exit_codes::EXIT_REVIEW_UNREACHABLE, msg));
            }
            log::warn!("{msg}; pairs kept in review_queue.json");
        }
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| cli_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{}: {} records -> {} canonical — {} pairs scored ({} match, {} review, {} reject), {} conflicts, {} malformed{}",
        result.meta.config_name,
        s.input_records,
        s.canonical_records,
        s.pairs_scored,
        s.matches,
        s.review,
        s.reject,
        s.conflicts,
        s.malformed_values,
        if s.degraded_matcher { " [degraded matcher]" } else { "" },
    );

    Ok(())
}

fn sync_registry(
    config: &RunConfig,
    base_dir: &Path,
    result: &RunResult,
) -> Result<(), CliError> {
    let Some(ref registry) = config.registry else {
        return Ok(());
    };

    let path = base_dir.join(&registry.path);
    let mut store =
        RegistryStore::open(&path).map_err(|e| cli_err(EXIT_ERROR, e.to_string()))?;

    let snapshot = canonize_registry::sync(
        &mut store,
        &result.canonical,
        chrono::Utc::now(),
        registry.max_retries,
    )
    .map_err(|e| {
        let code = match e {
            RegistryError::Conflict { .. } => EXIT_REGISTRY_CONFLICT,
            RegistryError::Invariant(_) => EXIT_REGISTRY_INVARIANT,
            _ => EXIT_ERROR,
        };
        cli_err(code, e.to_string())
    })?;

    log::info!(
        "registry at version {} with {} entit{}",
        snapshot.version,
        snapshot.entries.len(),
        if snapshot.entries.len() == 1 { "y" } else { "ies" },
    );
    Ok(())
}

/// Review submission is best-effort by default: the queue being down must
/// not fail the run, since the artifacts already carry the review-tier
/// pairs. `--strict-review` promotes failures to errors.
fn submit_review_tasks(
    result: &RunResult,
    records: &[canonize_core::RawRecord],
) -> Result<(), String> {
    let pairs: Vec<_> = result.review_pairs().collect();
    if pairs.is_empty() {
        return Ok(());
    }

    let client = ReviewClient::from_saved_auth()
        .map_err(|e| format!("review queue: {e} ({} pair(s) pending)", pairs.len()))?;

    let lookup: std::collections::BTreeMap<String, &canonize_core::RawRecord> =
        records.iter().map(|r| (r.qualified_id(), r)).collect();
    let tasks: Vec<_> = pairs.iter().map(|p| build_task(p, &lookup)).collect();

    let accepted = client
        .submit_tasks(&tasks)
        .map_err(|e| format!("review queue submission failed: {e}"))?;
    log::info!("submitted {} review task(s), {accepted} newly accepted", tasks.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
name = "cli test"

[sources.crm]
file = "crm.csv"
priority = 2

[sources.signups]
file = "signups.csv"
priority = 1

[registry]
path = "registry.db"

[output]
dir = "out"
"#;

    fn write_fixture(dir: &TempDir) -> PathBuf {
        let config_path = dir.path().join("merge.toml");
        fs::write(&config_path, CONFIG).unwrap();
        fs::write(
            dir.path().join("crm.csv"),
            "record_id,organization_name,email\n\
             1,Aero School,info@aero.example\n\
             2,Zebra Mining,ops@zebra.example\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("signups.csv"),
            "record_id,organization_name,email\n\
             9,Aero School Inc,info@aero.example\n",
        )
        .unwrap();
        config_path
    }

    #[test]
    fn validate_accepts_good_config() {
        let dir = TempDir::new().unwrap();
        let config_path = write_fixture(&dir);
        cmd_validate(config_path).unwrap();
    }

    #[test]
    fn validate_rejects_bad_thresholds_with_config_code() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("bad.toml");
        fs::write(
            &config_path,
            "name = \"bad\"\n[matcher.thresholds]\nreview = 0.9\nhigh = 0.5\n",
        )
        .unwrap();
        let err = cmd_validate(config_path).unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG);
    }

    #[test]
    fn run_writes_artifacts_and_registry() {
        let dir = TempDir::new().unwrap();
        let config_path = write_fixture(&dir);

        cmd_run(config_path, false, None, false, true, false).unwrap();

        let out = dir.path().join("out");
        for name in ["canonical.json", "conflicts.json", "matches.json", "metadata.json"] {
            assert!(out.join(name).exists(), "missing {name}");
        }
        assert!(dir.path().join("registry.db").exists());

        // Same email + near-identical names: the pair merges, so two
        // organizations remain across three records.
        let canonical: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.join("canonical.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(canonical.as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_source_file_is_an_input_error() {
        let dir = TempDir::new().unwrap();
        let config_path = write_fixture(&dir);
        fs::remove_file(dir.path().join("signups.csv")).unwrap();

        let err = cmd_run(config_path, false, None, true, true, false).unwrap_err();
        assert_eq!(err.code, EXIT_INPUT);
    }

    #[test]
    fn registry_sync_is_idempotent_across_runs() {
        let dir = TempDir::new().unwrap();
        let config_path = write_fixture(&dir);

        cmd_run(config_path.clone(), false, None, false, true, false).unwrap();
        cmd_run(config_path, false, None, false, true, false).unwrap();

        let store = RegistryStore::open(&dir.path().join("registry.db")).unwrap();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.version, 2);
        // Same input both times: still two entities, no duplicates minted.
        assert_eq!(snapshot.entries.len(), 2);
    }
}
