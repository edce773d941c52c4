//! Strava API client for authenticated requests
//!
//! This module provides a thin client for the Strava v3 REST API using OAuth2
//! bearer tokens. Responses are returned as raw JSON; mapping into typed
//! records happens in [`crate::models`].

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::client::tokens::Credentials;
use crate::error::{Result, StravaError};

/// Strava API base URL
const API_BASE_URL: &str = "https://www.strava.com/api/v3";

/// User agent for API requests
const API_USER_AGENT: &str = concat!("strava-cli/", env!("CARGO_PKG_VERSION"));

/// Largest page size the activity list endpoint accepts
pub const MAX_PER_PAGE: u32 = 200;

/// Filters for the athlete activity list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityQuery {
    /// Maximum number of activities to return
    pub limit: u32,
    /// Only activities starting after this Unix timestamp
    pub after: Option<i64>,
    /// Only activities starting before this Unix timestamp
    pub before: Option<i64>,
}

impl Default for ActivityQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            after: None,
            before: None,
        }
    }
}

/// Strava API client
pub struct StravaClient {
    client: Client,
    base_url: String,
}

impl StravaClient {
    /// Create a new API client for the production endpoint
    pub fn new() -> Result<Self> {
        Self::new_with_base_url(API_BASE_URL)
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StravaError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for a given path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with authorization
    fn build_headers(&self, token: &Credentials) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let auth = HeaderValue::from_str(&token.authorization_header())
            .map_err(|_| StravaError::invalid_param("access token contains invalid characters"))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the JSON body
    pub async fn get_json<Q>(&self, token: &Credentials, path: &str, query: &Q) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        let url = self.build_url(path);
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers(token)?)
            .query(query)
            .send()
            .await
            .map_err(|e| StravaError::remote(format!("GET {} failed: {}", path, e)))?;

        self.parse_json(path, response).await
    }

    /// Make an authenticated PUT request with a JSON body and return the JSON response
    pub async fn put_json<B>(&self, token: &Credentials, path: &str, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path);
        tracing::debug!(%url, "PUT");

        let response = self
            .client
            .put(&url)
            .headers(self.build_headers(token)?)
            .json(body)
            .send()
            .await
            .map_err(|e| StravaError::remote(format!("PUT {} failed: {}", path, e)))?;

        self.parse_json(path, response).await
    }

    /// List the authenticated athlete's activities, newest first.
    ///
    /// Pages through the endpoint until `query.limit` payloads are collected
    /// or the server returns a short page.
    pub async fn list_activities(
        &self,
        token: &Credentials,
        query: &ActivityQuery,
    ) -> Result<Vec<Value>> {
        let mut activities = Vec::new();
        if query.limit == 0 {
            return Ok(activities);
        }

        let per_page = query.limit.min(MAX_PER_PAGE);
        let mut page = 1u32;

        loop {
            let mut params = vec![
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ];
            if let Some(after) = query.after {
                params.push(("after", after.to_string()));
            }
            if let Some(before) = query.before {
                params.push(("before", before.to_string()));
            }

            let body = self
                .get_json(token, "/athlete/activities", &params)
                .await?;
            let batch = match body {
                Value::Array(items) => items,
                other => {
                    return Err(StravaError::remote(format!(
                        "expected an array of activities, got {}",
                        json_kind(&other)
                    )))
                }
            };

            let batch_len = batch.len();
            let remaining = (query.limit as usize).saturating_sub(activities.len());
            activities.extend(batch.into_iter().take(remaining));

            if activities.len() >= query.limit as usize || batch_len < per_page as usize {
                break;
            }
            page += 1;
        }

        tracing::debug!(count = activities.len(), pages = page, "listed activities");
        Ok(activities)
    }

    /// Fetch a single detailed activity
    pub async fn get_activity(&self, token: &Credentials, id: u64) -> Result<Value> {
        let path = format!("/activities/{}", id);
        self.get_json(token, &path, &[] as &[(&str, &str)]).await
    }

    /// Update an activity and return the updated payload
    pub async fn update_activity<B>(&self, token: &Credentials, id: u64, update: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let path = format!("/activities/{}", id);
        self.put_json(token, &path, update).await
    }

    /// Check the status code and decode the JSON body
    async fn parse_json(&self, path: &str, response: Response) -> Result<Value> {
        let response = self.handle_response_status(path, response).await?;
        response.json().await.map_err(|e| {
            StravaError::remote(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Handle response status codes and convert to errors
    async fn handle_response_status(&self, path: &str, response: Response) -> Result<Response> {
        let status = response.status();

        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(StravaError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Strava rate limit hit (429)");
                Err(StravaError::RateLimited)
            }
            StatusCode::NOT_FOUND => Err(StravaError::remote(format!(
                "Resource not found: {}",
                path
            ))),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(StravaError::remote(format!("API error {}: {}", status, body)))
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
