use std::fmt;

#[derive(Debug)]
pub enum RegistryError {
    /// Underlying SQLite failure.
    Storage(String),
    /// Another writer advanced the registry between load and persist.
    /// Recoverable: reload, re-merge, retry.
    VersionMismatch { expected: i64, found: i64 },
    /// Version conflicts persisted through every retry.
    Conflict { attempts: u32 },
    /// The registry's append-only or uniqueness guarantees were violated.
    /// Always fatal, never retried.
    Invariant(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "registry storage error: {msg}"),
            Self::VersionMismatch { expected, found } => write!(
                f,
                "registry version moved from {expected} to {found} during sync"
            ),
            Self::Conflict { attempts } => write!(
                f,
                "registry version conflict persisted after {attempts} attempt(s)"
            ),
            Self::Invariant(msg) => write!(f, "registry invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
