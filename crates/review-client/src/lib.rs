//! `canonize-review-client` — bridge to the human review queue.
//!
//! Review-tier pairs are submitted as tasks with field-level evidence;
//! decisions flow back asynchronously and are applied on later runs. Queue
//! availability is not load-bearing by default: callers treat submission
//! failures as warnings unless they opt into strict handling.

pub mod auth;
pub mod client;
pub mod task;

pub use auth::{delete_auth, load_auth, save_auth, ReviewCredentials};
pub use client::{ReviewClient, ReviewError};
pub use task::{build_task, task_key, FieldEvidence, ReviewTask};
