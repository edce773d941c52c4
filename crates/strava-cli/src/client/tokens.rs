use chrono::Utc;
use serde::Serialize;

/// Seconds before `expires_at` at which the access token is refreshed proactively.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// OAuth2 token triple stored in the token file.
/// The access token is short-lived (~6 hours) and minted from the refresh token.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp in seconds. `None` when the file does not record it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Whether the token must be refreshed at `now` (Unix seconds).
    ///
    /// An unknown expiry never triggers a refresh.
    pub fn needs_refresh_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at - REFRESH_MARGIN_SECS,
            None => false,
        }
    }

    /// Whether the token must be refreshed now.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now().timestamp())
    }

    /// Seconds until expiry, negative once expired.
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_at.map(|at| at - Utc::now().timestamp())
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}
