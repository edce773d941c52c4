//! Strava OAuth token endpoint
//!
//! Only the refresh-token grant lives here. The authorization-code exchange
//! that produces the first token pair happens outside this tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::client::tokens::Credentials;
use crate::config::AppCredentials;
use crate::error::{Result, StravaError};

/// Strava token endpoint
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Exchanges a refresh token for a new token triple.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Mint a new triple. Failures surface as `RefreshFailed`.
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials>;
}

/// Raw token endpoint response; every field is checked before use.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn into_credentials(self) -> Result<Credentials> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StravaError::refresh("response is missing access_token"))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StravaError::refresh("response is missing refresh_token"))?;
        let expires_at = self
            .expires_at
            .ok_or_else(|| StravaError::refresh("response is missing expires_at"))?;

        Ok(Credentials::new(access_token, refresh_token, Some(expires_at)))
    }
}

/// Client for the Strava OAuth token endpoint
pub struct StravaOAuthClient {
    client: Client,
    token_url: String,
    app: AppCredentials,
}

impl StravaOAuthClient {
    /// Create a client for the production token endpoint
    pub fn new(app: AppCredentials) -> Result<Self> {
        Self::new_with_token_url(app, TOKEN_URL)
    }

    /// Create a client against a custom token URL (for testing)
    #[doc(hidden)]
    pub fn new_with_token_url(app: AppCredentials, token_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StravaError::refresh(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token_url: token_url.to_string(),
            app,
        })
    }
}

#[async_trait]
impl TokenRefresher for StravaOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials> {
        tracing::debug!(url = %self.token_url, "requesting refresh_token grant");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| StravaError::refresh(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StravaError::refresh(format!("HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StravaError::refresh(format!("invalid response body: {}", e)))?;

        token.into_credentials()
    }
}
