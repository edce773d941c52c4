use crate::client::{Credentials, TokenRefresher};
use crate::error::{Result, StravaError};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Manages the on-disk token file.
///
/// The file is read on every invocation and fully rewritten (temp file +
/// rename) whenever the access token is refreshed. It is never deleted here.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store for the token file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token triple from disk
    pub fn load(&self) -> Result<Credentials> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StravaError::CredentialsNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let value: Value = serde_json::from_str(&json)
            .map_err(|e| StravaError::credentials_invalid(&self.path, e.to_string()))?;
        let obj = value
            .as_object()
            .ok_or_else(|| StravaError::credentials_invalid(&self.path, "expected a JSON object"))?;

        let token_field = |name: &str| {
            obj.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    StravaError::credentials_invalid(
                        &self.path,
                        "missing access_token or refresh_token",
                    )
                })
        };

        let access_token = token_field("access_token")?;
        let refresh_token = token_field("refresh_token")?;

        let expires_at = match obj.get("expires_at") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(
                n.as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| {
                        StravaError::credentials_invalid(&self.path, "expires_at is out of range")
                    })?,
            ),
            Some(_) => {
                return Err(StravaError::credentials_invalid(
                    &self.path,
                    "expires_at must be a number",
                ))
            }
        };

        Ok(Credentials {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Atomically replace the token file with `creds`.
    ///
    /// Readers see either the previous file or the new one in full. Each call
    /// writes its own temp file, so concurrent saves never share one.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        let json = serde_json::to_string_pretty(creds)?;
        let dir = self.parent_dir();

        // Dropping the temp file on any early return removes it
        let mut file = NamedTempFile::new_in(dir)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| StravaError::Io(e.error))?;

        sync_dir(dir)?;
        Ok(())
    }

    /// Return credentials usable right now, refreshing and persisting them if needed.
    pub async fn ensure_fresh<R>(&self, creds: Credentials, refresher: &R) -> Result<Credentials>
    where
        R: TokenRefresher + ?Sized,
    {
        self.ensure_fresh_at(creds, refresher, Utc::now().timestamp())
            .await
    }

    /// Same as [`ensure_fresh`](Self::ensure_fresh) with an explicit clock.
    pub async fn ensure_fresh_at<R>(
        &self,
        creds: Credentials,
        refresher: &R,
        now: i64,
    ) -> Result<Credentials>
    where
        R: TokenRefresher + ?Sized,
    {
        if !creds.needs_refresh_at(now) {
            tracing::debug!(expires_at = ?creds.expires_at, "access token is fresh");
            return Ok(creds);
        }

        tracing::info!(expires_at = ?creds.expires_at, "refreshing access token");
        let refreshed = refresher.refresh(&creds.refresh_token).await?;
        self.save(&refreshed)?;
        tracing::debug!(path = %self.path.display(), "saved refreshed token");

        Ok(refreshed)
    }

    /// Directory holding the token file; temp files are created there.
    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000;

    struct FakeRefresher {
        calls: AtomicUsize,
        response: Option<Credentials>,
    }

    impl FakeRefresher {
        fn returning(creds: Credentials) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Some(creds),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(refresh_token, "old_refresh");
            self.response
                .clone()
                .ok_or_else(|| StravaError::refresh("HTTP 400: invalid_grant"))
        }
    }

    fn store_with(temp_dir: &TempDir, contents: &str) -> CredentialStore {
        let path = temp_dir.path().join("strava-token.json");
        fs::write(&path, contents).unwrap();
        CredentialStore::new(path)
    }

    fn old_creds(expires_at: Option<i64>) -> Credentials {
        Credentials::new("old_access", "old_refresh", expires_at)
    }

    fn new_creds() -> Credentials {
        Credentials::new("new_access", "new_refresh", Some(NOW + 21600))
    }

    #[test]
    fn test_load_valid_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(
            &temp_dir,
            r#"{"access_token": "a", "refresh_token": "r", "expires_at": 1700000000}"#,
        );

        let creds = store.load().unwrap();
        assert_eq!(creds, Credentials::new("a", "r", Some(1700000000)));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().join("absent.json"));

        let err = store.load().unwrap_err();
        assert!(matches!(err, StravaError::CredentialsNotFound { ref path } if path.ends_with("absent.json")));
    }

    #[test]
    fn test_load_missing_token_fields() {
        let temp_dir = TempDir::new().unwrap();
        for contents in [
            r#"{"refresh_token": "r", "expires_at": 1}"#,
            r#"{"access_token": "a", "expires_at": 1}"#,
            r#"{"access_token": "", "refresh_token": "r"}"#,
            r#"{"access_token": 42, "refresh_token": "r"}"#,
            r#"{}"#,
        ] {
            let store = store_with(&temp_dir, contents);
            let err = store.load().unwrap_err();
            assert!(
                matches!(err, StravaError::CredentialsInvalid { .. }),
                "{} -> {:?}",
                contents,
                err
            );
        }
    }

    #[test]
    fn test_load_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        for contents in ["not json", "[1, 2]", r#"{"access_token": "a""#] {
            let store = store_with(&temp_dir, contents);
            assert!(matches!(
                store.load().unwrap_err(),
                StravaError::CredentialsInvalid { .. }
            ));
        }
    }

    #[test]
    fn test_load_tolerates_missing_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, r#"{"access_token": "a", "refresh_token": "r"}"#);
        assert_eq!(store.load().unwrap().expires_at, None);

        let store = store_with(
            &temp_dir,
            r#"{"access_token": "a", "refresh_token": "r", "expires_at": null}"#,
        );
        assert_eq!(store.load().unwrap().expires_at, None);
    }

    #[test]
    fn test_load_rejects_non_numeric_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(
            &temp_dir,
            r#"{"access_token": "a", "refresh_token": "r", "expires_at": "soon"}"#,
        );
        assert!(matches!(
            store.load().unwrap_err(),
            StravaError::CredentialsInvalid { .. }
        ));
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, r#"{"access_token": "a", "refresh_token": "r", "extra": "x"}"#);

        store.save(&new_creds()).unwrap();

        assert_eq!(store.load().unwrap(), new_creds());
        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw.get("extra").is_none());

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().join("strava-token.json"));
        store.save(&new_creds()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_save_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().join("missing-dir").join("t.json"));
        assert!(store.save(&new_creds()).is_err());

        // a non-empty directory squatting on the token path makes the rename fail
        let target = temp_dir.path().join("strava-token.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();
        let store = CredentialStore::new(&target);

        assert!(store.save(&new_creds()).is_err());
        assert!(target.join("keep").exists());
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_relative_path_uses_current_dir() {
        let store = CredentialStore::new("strava-token.json");
        assert_eq!(store.parent_dir(), Path::new("."));

        let store = CredentialStore::new("/tmp/tokens/strava-token.json");
        assert_eq!(store.parent_dir(), Path::new("/tmp/tokens"));
    }

    #[test]
    fn test_concurrent_saves_never_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().join("strava-token.json"));
        store.save(&new_creds()).unwrap();

        std::thread::scope(|scope| {
            for thread in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..50 {
                        let creds = Credentials::new(
                            format!("access_{}_{}", thread, round),
                            format!("refresh_{}_{}", thread, round),
                            Some(NOW + round),
                        );
                        store.save(&creds).unwrap();

                        let loaded = store.load().unwrap();
                        assert!(loaded.access_token.starts_with("access_"));
                        assert_eq!(
                            loaded.access_token.trim_start_matches("access_"),
                            loaded.refresh_token.trim_start_matches("refresh_")
                        );
                    }
                });
            }
        });

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, "{}");
        let refresher = FakeRefresher::returning(new_creds());

        let creds = old_creds(Some(NOW + 3600));
        let result = store
            .ensure_fresh_at(creds.clone(), &refresher, NOW)
            .await
            .unwrap();

        assert_eq!(result, creds);
        assert_eq!(refresher.calls(), 0);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_unknown_expiry_skips_refresh() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, "{}");
        let refresher = FakeRefresher::returning(new_creds());

        let result = store
            .ensure_fresh_at(old_creds(None), &refresher, NOW)
            .await
            .unwrap();

        assert_eq!(result, old_creds(None));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_and_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, "{}");
        let refresher = FakeRefresher::returning(new_creds());

        for expires_at in [NOW + 120, NOW - 10] {
            let result = store
                .ensure_fresh_at(old_creds(Some(expires_at)), &refresher, NOW)
                .await
                .unwrap();

            assert_eq!(result, new_creds());
            assert_eq!(store.load().unwrap(), new_creds());
        }
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_file_intact() {
        let temp_dir = TempDir::new().unwrap();
        let original = r#"{"access_token": "old_access", "refresh_token": "old_refresh", "expires_at": 1}"#;
        let store = store_with(&temp_dir, original);
        let refresher = FakeRefresher::failing();

        let err = store
            .ensure_fresh_at(old_creds(Some(1)), &refresher, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, StravaError::RefreshFailed(_)));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
        assert_eq!(store.load().unwrap(), old_creds(Some(1)));
    }

    #[tokio::test]
    async fn test_repeated_refreshes_keep_file_parseable() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(
            &temp_dir,
            r#"{"access_token": "old_access", "refresh_token": "old_refresh", "expires_at": 1}"#,
        );
        let ok = FakeRefresher::returning(new_creds());
        let failing = FakeRefresher::failing();

        for i in 0..10 {
            let refresher = if i % 3 == 0 { &failing } else { &ok };
            let _ = store
                .ensure_fresh_at(old_creds(Some(1)), refresher, NOW)
                .await;
            let loaded = store.load().unwrap();
            assert!(loaded == new_creds() || loaded == old_creds(Some(1)));
        }
    }
}
