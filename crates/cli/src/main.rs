// canonize CLI - entity canonicalization pipeline operations

mod exit_codes;
mod review;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use canonize_review_client::{delete_auth, save_auth, ReviewCredentials};
use exit_codes::{EXIT_ERROR, EXIT_SUCCESS};

/// A command failure carrying its exit code and an optional hint.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Parser)]
#[command(name = "canonize")]
#[command(about = "Canonicalize fragmented organization records across datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline from a TOML config file
    #[command(after_help = "\
Examples:
  canonize run merge.toml
  canonize run merge.toml --json
  canonize run merge.toml --output-dir /tmp/out --skip-review")]
    Run {
        /// Path to the pipeline config file
        config: PathBuf,

        /// Output the full run result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Artifact directory (defaults to the config's output.dir, else ./out)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Skip the entity registry sync
        #[arg(long)]
        skip_registry: bool,

        /// Skip review queue submission
        #[arg(long)]
        skip_review: bool,

        /// Treat review queue submission failure as a run failure
        #[arg(long, conflicts_with = "skip_review")]
        strict_review: bool,
    },

    /// Validate a pipeline config without running
    #[command(after_help = "\
Examples:
  canonize validate merge.toml")]
    Validate {
        /// Path to the pipeline config file
        config: PathBuf,
    },

    /// Review queue operations
    #[command(subcommand)]
    Review(review::ReviewCommands),

    /// Save review queue credentials
    Login {
        /// Bearer token for the review queue API
        #[arg(long, env = "CANONIZE_REVIEW_TOKEN")]
        token: String,

        /// API base URL
        #[arg(long, default_value = "https://review.internal.example")]
        api_base: String,
    },

    /// Remove saved review queue credentials
    Logout,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run { config, json, output_dir, skip_registry, skip_review, strict_review } => {
            run::cmd_run(config, json, output_dir, skip_registry, skip_review, strict_review)
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Review(cmd) => review::cmd_review(cmd),
        Commands::Login { token, api_base } => cmd_login(token, api_base),
        Commands::Logout => cmd_logout(),
    };

    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = e.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(e.code)
        }
    }
}

fn cmd_login(token: String, api_base: String) -> Result<(), CliError> {
    let creds = ReviewCredentials::new(token, api_base);
    save_auth(&creds).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: e,
        hint: None,
    })?;
    eprintln!("credentials saved");
    Ok(())
}

fn cmd_logout() -> Result<(), CliError> {
    delete_auth().map_err(|e| CliError {
        code: EXIT_ERROR,
        message: e,
        hint: None,
    })?;
    eprintln!("credentials removed");
    Ok(())
}
