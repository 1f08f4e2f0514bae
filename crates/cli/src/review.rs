//! `canonize review` — pull adjudications back from the review queue.

use std::path::PathBuf;
use std::time::Duration;

use clap::Subcommand;

use canonize_review_client::{task_key, ReviewClient, ReviewError};

use crate::exit_codes::{EXIT_ERROR, EXIT_INPUT, EXIT_REVIEW_UNREACHABLE};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Fetch recorded decisions and append them to the local decision log
    #[command(after_help = "\
Examples:
  canonize review fetch out/decisions.jsonl
  canonize review fetch out/decisions.jsonl --since 2026-05-01T00:00:00Z
  canonize review fetch out/decisions.jsonl --queue out/review_queue.json --wait 600")]
    Fetch {
        /// Path to the append-only decisions.jsonl log
        decisions: PathBuf,

        /// Only fetch decisions recorded after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,

        /// Wait up to this many seconds for every queued pair to be decided
        #[arg(long, value_name = "SECS", requires = "queue")]
        wait: Option<u64>,

        /// review_queue.json from a run, listing the pairs to wait on
        #[arg(long, requires = "wait")]
        queue: Option<PathBuf>,
    },
}

pub fn cmd_review(cmd: ReviewCommands) -> Result<(), CliError> {
    match cmd {
        ReviewCommands::Fetch { decisions, since, wait, queue } => {
            cmd_review_fetch(decisions, since, wait, queue)
        }
    }
}

fn cmd_review_fetch(
    decisions_path: PathBuf,
    since: Option<String>,
    wait: Option<u64>,
    queue: Option<PathBuf>,
) -> Result<(), CliError> {
    let client = ReviewClient::from_saved_auth().map_err(review_err)?;

    let decisions = match (wait, queue) {
        (Some(secs), Some(queue_path)) => {
            let pairs = canonize_io::load_review_queue(&queue_path)
                .map_err(|e| CliError { code: EXIT_INPUT, message: e.to_string(), hint: None })?;
            let keys: Vec<String> = pairs
                .iter()
                .map(|p| task_key(&p.record_a_id, &p.record_b_id))
                .collect();
            client
                .poll_decisions(&keys, Duration::from_secs(secs))
                .map_err(review_err)?
        }
        _ => client.fetch_decisions(since.as_deref()).map_err(review_err)?,
    };

    let appended = canonize_io::append_decisions(&decisions_path, &decisions)
        .map_err(|e| CliError { code: EXIT_ERROR, message: e.to_string(), hint: None })?;

    eprintln!(
        "fetched {} decision(s), {appended} new — log at {}",
        decisions.len(),
        decisions_path.display(),
    );
    Ok(())
}

fn review_err(e: ReviewError) -> CliError {
    let hint = match e {
        ReviewError::NotAuthenticated => Some("run `canonize login --token <TOKEN>` first".into()),
        _ => None,
    };
    CliError {
        code: EXIT_REVIEW_UNREACHABLE,
        message: e.to_string(),
        hint,
    }
}
