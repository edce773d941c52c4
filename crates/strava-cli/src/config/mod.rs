mod credentials;

pub use credentials::CredentialStore;

use crate::error::{Result, StravaError};
use std::path::PathBuf;

/// Token file used when none is given on the command line or environment
pub const DEFAULT_TOKEN_FILE: &str = "strava-token.json";

const CLIENT_ID_VAR: &str = "STRAVA_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "STRAVA_CLIENT_SECRET";

/// OAuth application credentials needed by the refresh grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Runtime configuration, built once in `main` and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub token_file: PathBuf,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            client_id: None,
            client_secret: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            client_id: non_empty(CLIENT_ID_VAR),
            client_secret: non_empty(CLIENT_SECRET_VAR),
        }
    }

    /// Override the token file path
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = path.into();
        self
    }

    /// Client id and secret for the refresh grant.
    ///
    /// Only the refresh path needs these, so their absence is reported as a
    /// refresh failure rather than at startup.
    pub fn app_credentials(&self) -> Result<AppCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(AppCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => Err(StravaError::refresh(format!(
                "{} and {} must be set in environment",
                CLIENT_ID_VAR, CLIENT_SECRET_VAR
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.token_file, PathBuf::from("strava-token.json"));
        assert!(config.client_id.is_none());
        assert!(config.client_secret.is_none());
    }

    #[test]
    fn test_app_credentials_present() {
        let config = Config::from_lookup(lookup(&[
            ("STRAVA_CLIENT_ID", "12345"),
            ("STRAVA_CLIENT_SECRET", " s3cret\n"),
        ]));
        let app = config.app_credentials().unwrap();
        assert_eq!(app.client_id, "12345");
        assert_eq!(app.client_secret, "s3cret");
    }

    #[test]
    fn test_app_credentials_missing_secret() {
        let config = Config::from_lookup(lookup(&[("STRAVA_CLIENT_ID", "12345")]));
        let err = config.app_credentials().unwrap_err();
        assert!(matches!(err, StravaError::RefreshFailed(_)));
        assert!(err.to_string().contains("STRAVA_CLIENT_SECRET"));
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("STRAVA_CLIENT_ID", ""),
            ("STRAVA_CLIENT_SECRET", "x"),
        ]));
        assert!(config.client_id.is_none());
        assert!(config.app_credentials().is_err());
    }

    #[test]
    fn test_with_token_file() {
        let config = Config::default().with_token_file("/tmp/tokens.json");
        assert_eq!(config.token_file, PathBuf::from("/tmp/tokens.json"));
    }
}
