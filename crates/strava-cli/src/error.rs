use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for strava-cli
#[derive(Error, Debug)]
pub enum StravaError {
    #[error("Token file not found: {}", .path.display())]
    CredentialsNotFound { path: PathBuf },

    #[error("Invalid token file {}: {reason}", .path.display())]
    CredentialsInvalid { path: PathBuf, reason: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Malformed activity: field '{field}' {reason}")]
    MalformedActivity { field: String, reason: String },

    #[error("Request failed: {0}")]
    RemoteRequestFailed(String),

    #[error("Access token rejected by Strava")]
    Unauthorized,

    #[error("Rate limited. Please wait before retrying.")]
    RateLimited,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, StravaError>;

impl StravaError {
    /// Create a credentials-invalid error for the given token file
    pub fn credentials_invalid(path: &Path, reason: impl Into<String>) -> Self {
        Self::CredentialsInvalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a refresh error from a message
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::RefreshFailed(msg.into())
    }

    /// Create a malformed-activity error naming the offending field
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedActivity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote request error from a message
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteRequestFailed(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid parameter error from a message
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Render an error for the terminal, with a hint where the user can act on it.
pub fn format_user_error(err: &StravaError) -> String {
    match err {
        StravaError::CredentialsNotFound { .. } => format!(
            "{}\nCreate it with access_token, refresh_token and expires_at from the Strava OAuth flow.",
            err
        ),
        StravaError::RefreshFailed(_) => format!(
            "{}\nCheck STRAVA_CLIENT_ID and STRAVA_CLIENT_SECRET (environment or .env).",
            err
        ),
        StravaError::Unauthorized => format!(
            "{}\nThe token may have been revoked; re-authorize and replace the token file.",
            err
        ),
        _ => err.to_string(),
    }
}
