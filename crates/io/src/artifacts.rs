//! Run artifact persistence.
//!
//! Each run writes a fixed set of JSON artifacts into the output directory:
//! canonical.json, conflicts.json, matches.json, review_queue.json and
//! metadata.json. Review decisions accumulate separately in an append-only
//! decisions.jsonl keyed by task.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use canonize_core::{Classification, MatchPair, ReviewDecision};
use canonize_engine::RunResult;

use crate::error::IoError;

#[derive(Serialize)]
struct Metadata<'a> {
    meta: &'a canonize_engine::RunMeta,
    summary: &'a canonize_engine::RunSummary,
}

/// Write the full artifact set for one run. The directory is created if
/// needed; existing artifacts from a previous run are overwritten.
pub fn write_artifacts(dir: &Path, result: &RunResult) -> Result<(), IoError> {
    fs::create_dir_all(dir)?;

    write_json(&dir.join("canonical.json"), &result.canonical)?;
    write_json(&dir.join("conflicts.json"), &result.conflicts)?;
    write_json(&dir.join("matches.json"), &result.pairs)?;

    let review: Vec<_> = result
        .pairs
        .iter()
        .filter(|p| p.classification == Classification::Review)
        .collect();
    write_json(&dir.join("review_queue.json"), &review)?;

    write_json(
        &dir.join("metadata.json"),
        &Metadata {
            meta: &result.meta,
            summary: &result.summary,
        },
    )?;

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| IoError::Io(format!("{}: {e}", path.display())))
}

/// Read a run's review_queue.json back into pairs, e.g. to wait on their
/// decisions after the run has exited.
pub fn load_review_queue(path: &Path) -> Result<Vec<MatchPair>, IoError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Append decisions to the log, skipping task keys already present.
/// Returns the number of decisions actually appended.
pub fn append_decisions(path: &Path, decisions: &[ReviewDecision]) -> Result<usize, IoError> {
    let known: BTreeSet<String> = load_decisions(path)?
        .into_iter()
        .map(|d| d.task_key)
        .collect();

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;

    let mut appended = 0;
    for decision in decisions {
        if known.contains(&decision.task_key) {
            continue;
        }
        let line = serde_json::to_string(decision)?;
        writeln!(file, "{line}")?;
        appended += 1;
    }
    Ok(appended)
}

/// Read the decision log. A missing file is an empty log.
pub fn load_decisions(path: &Path) -> Result<Vec<ReviewDecision>, IoError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(IoError::Io(format!("{}: {e}", path.display()))),
    };

    let mut decisions = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        decisions.push(serde_json::from_str(line)?);
    }
    Ok(decisions)
}
