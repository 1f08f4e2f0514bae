//! `canonize-io` — CSV ingestion and artifact persistence.

pub mod artifacts;
pub mod csv;
pub mod error;

pub use crate::artifacts::{append_decisions, load_decisions, load_review_queue, write_artifacts};
pub use crate::csv::{load_source_records, load_sources};
pub use crate::error::IoError;
