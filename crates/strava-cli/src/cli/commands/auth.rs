//! Authentication commands for strava-cli

use async_trait::async_trait;

use crate::client::{Credentials, StravaOAuthClient, TokenRefresher};
use crate::config::{Config, CredentialStore};
use crate::error::Result;

/// Refresher that reads the OAuth app credentials only when a refresh happens,
/// so a fresh token works without STRAVA_CLIENT_ID/SECRET set.
struct ConfiguredRefresher<'a> {
    config: &'a Config,
}

#[async_trait]
impl<'a> TokenRefresher for ConfiguredRefresher<'a> {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials> {
        let app = self.config.app_credentials()?;
        StravaOAuthClient::new(app)?.refresh(refresh_token).await
    }
}

/// Load the token file and return credentials that are valid right now
pub async fn authenticate(config: &Config) -> Result<Credentials> {
    let store = CredentialStore::new(&config.token_file);
    let creds = store.load()?;
    store
        .ensure_fresh(creds, &ConfiguredRefresher { config })
        .await
}

/// Execute the status command
pub async fn status(config: &Config) -> Result<()> {
    let store = CredentialStore::new(&config.token_file);
    let creds = store.load()?;

    println!("Token file: {}", store.path().display());

    match creds.expires_in() {
        None => println!("Access Token: Expiry unknown (used as-is)"),
        Some(_) if creds.needs_refresh() => {
            println!("Access Token: Expired or expiring (will refresh on next request)")
        }
        Some(expires_in) if expires_in > 3600 => {
            println!("Access Token: Valid (expires in {} hours)", expires_in / 3600)
        }
        Some(expires_in) => {
            println!("Access Token: Valid (expires in {} minutes)", expires_in / 60)
        }
    }

    let refresh_ready = config.app_credentials().is_ok();
    println!(
        "Refresh: {}",
        if refresh_ready {
            "client id and secret configured"
        } else {
            "STRAVA_CLIENT_ID / STRAVA_CLIENT_SECRET not set"
        }
    );

    Ok(())
}
