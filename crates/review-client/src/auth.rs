//! Token storage for the review queue service.
//!
//! Reads/writes ~/.config/canonize/auth.json (0600 on Unix).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Review service credentials stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCredentials {
    /// Bearer token for the review queue API
    pub token: String,
    /// API base URL (e.g., "https://review.internal.example")
    pub api_base: String,
    /// Reviewer identity attached to submitted tasks (for display)
    #[serde(default)]
    pub reviewer: Option<String>,
}

impl ReviewCredentials {
    pub fn new(token: String, api_base: String) -> Self {
        Self { token, api_base, reviewer: None }
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("canonize/auth.json"))
}

/// Load saved credentials from disk.
/// Returns None if no credentials are saved or if the file is invalid.
pub fn load_auth() -> Option<ReviewCredentials> {
    let path = auth_file_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save credentials to disk.
/// Creates the parent directory if it doesn't exist.
/// Sets 0600 permissions on Unix.
pub fn save_auth(creds: &ReviewCredentials) -> Result<(), String> {
    let path = auth_file_path().ok_or("Could not determine config directory")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;

    std::fs::write(&path, &contents)
        .map_err(|e| format!("Failed to write auth file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    Ok(())
}

/// Delete saved credentials.
pub fn delete_auth() -> Result<(), String> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| format!("Failed to delete auth file: {}", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_roundtrip() {
        let creds = ReviewCredentials {
            token: "test-token".into(),
            api_base: "https://review.test".into(),
            reviewer: Some("alice".into()),
        };

        let json = serde_json::to_string_pretty(&creds).unwrap();
        let parsed: ReviewCredentials = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.token, "test-token");
        assert_eq!(parsed.api_base, "https://review.test");
        assert_eq!(parsed.reviewer.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_optional_fields() {
        let json = r#"{"token":"tok","api_base":"https://review.test"}"#;
        let parsed: ReviewCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "tok");
        assert!(parsed.reviewer.is_none());
    }

    #[test]
    fn auth_file_path_points_into_config() {
        let path = auth_file_path().unwrap();
        assert!(path.to_string_lossy().contains("canonize"));
        assert!(path.to_string_lossy().contains("auth.json"));
    }

    #[test]
    fn save_and_load_via_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");

        // Write and read directly since save_auth uses the real config path.
        let creds = ReviewCredentials::new("tok123".into(), "https://review.test".into());
        std::fs::write(&path, serde_json::to_string_pretty(&creds).unwrap()).unwrap();

        let loaded: ReviewCredentials =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.token, "tok123");
        assert_eq!(loaded.api_base, "https://review.test");
    }
}
