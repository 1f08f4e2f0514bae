use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// File or CSV reader failure.
    Io(String),
    /// A configured column is missing from the source's header row.
    MissingColumn { source: String, column: String },
    /// A value that must parse (quality score, timestamp) did not.
    BadValue {
        source: String,
        record_id: String,
        column: String,
        value: String,
    },
    /// Artifact serialization failure.
    Json(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::BadValue { source, record_id, column, value } => write!(
                f,
                "source '{source}' record '{record_id}': column '{column}' has unparseable value '{value}'"
            ),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
