use anyhow::{Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Margin before credential expiration when we proactively refresh (5 minutes).
const REFRESH_MARGIN_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Activity,
    Storage,
}

impl TokenKind {
    fn label(self) -> &'static str {
        match self {
            TokenKind::Activity => "activity API",
            TokenKind::Storage => "storage API",
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    /// No valid credential obtainable; the operator must re-run the
    /// authorization flow for the named API.
    AuthenticationRequired(&'static str),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::AuthenticationRequired(api) => {
                write!(f, "authentication required for the {api}, re-run the authorization flow")
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Credential file contents. Opaque to the rest of the tool except for
/// `expires_at`, which drives the refresh decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Unix seconds. Absent means the credential never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredCredential {
    fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now + REFRESH_MARGIN_SECS >= expires_at,
            None => false,
        }
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
            && self.token_uri.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
    }
}

/// Refresh endpoints disagree on the expiry field: Strava returns an
/// absolute `expires_at`, Google a relative `expires_in`.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
}

/// Supplies valid bearer tokens for both external APIs, refreshing expired
/// credentials on demand and persisting the result so later runs skip
/// re-authorization.
pub struct TokenProvider {
    // Plain client on purpose: a refresh must be attempted exactly once,
    // so no retry middleware here.
    http: reqwest::Client,
    credential_files: HashMap<TokenKind, PathBuf>,
    cache: Mutex<HashMap<TokenKind, StoredCredential>>,
}

impl TokenProvider {
    pub fn new(activity_credentials: PathBuf, storage_credentials: PathBuf) -> Self {
        let mut credential_files = HashMap::new();
        credential_files.insert(TokenKind::Activity, activity_credentials);
        credential_files.insert(TokenKind::Storage, storage_credentials);

        Self {
            http: reqwest::Client::new(),
            credential_files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return a non-expired access token for the given API, refreshing and
    /// persisting the credential if needed.
    pub async fn get_valid_token(&self, kind: TokenKind) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;

        let credential = match cache.get(&kind) {
            Some(credential) => credential.clone(),
            None => {
                let credential = self.load_credential(kind)?;
                cache.insert(kind, credential.clone());
                credential
            }
        };

        if !credential.is_expired(Utc::now().timestamp()) {
            return Ok(credential.access_token);
        }

        if !credential.can_refresh() {
            cache.remove(&kind);
            error!(
                "Credential for the {} is expired and carries no refresh token",
                kind.label()
            );
            return Err(AuthError::AuthenticationRequired(kind.label()));
        }

        info!("{} token expired, refreshing", kind.label());
        match self.refresh(&credential).await {
            Ok(refreshed) => {
                self.persist_credential(kind, &refreshed);
                let access_token = refreshed.access_token.clone();
                cache.insert(kind, refreshed);
                Ok(access_token)
            }
            Err(e) => {
                cache.remove(&kind);
                error!("Failed to refresh {} token: {e:#}", kind.label());
                Err(AuthError::AuthenticationRequired(kind.label()))
            }
        }
    }

    fn load_credential(&self, kind: TokenKind) -> Result<StoredCredential, AuthError> {
        let path = &self.credential_files[&kind];

        let content = std::fs::read_to_string(path).map_err(|e| {
            error!(
                "Cannot read credential file {} for the {}: {e}",
                path.display(),
                kind.label()
            );
            AuthError::AuthenticationRequired(kind.label())
        })?;

        serde_json::from_str(&content).map_err(|e| {
            error!(
                "Credential file {} is not valid JSON: {e}",
                path.display()
            );
            AuthError::AuthenticationRequired(kind.label())
        })
    }

    async fn refresh(&self, credential: &StoredCredential) -> Result<StoredCredential> {
        let (Some(refresh_token), Some(token_uri), Some(client_id), Some(client_secret)) = (
            credential.refresh_token.as_deref(),
            credential.token_uri.as_deref(),
            credential.client_id.as_deref(),
            credential.client_secret.as_deref(),
        ) else {
            bail!("credential carries no refresh material");
        };

        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("refresh endpoint returned HTTP {}", response.status());
        }

        let refreshed: RefreshResponse = response.json().await?;

        let expires_at = refreshed
            .expires_at
            .or_else(|| refreshed.expires_in.map(|s| Utc::now().timestamp() + s));

        Ok(StoredCredential {
            access_token: refreshed.access_token,
            // A refresh response without a rotated refresh token keeps the old one
            refresh_token: refreshed
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            token_uri: credential.token_uri.clone(),
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            expires_at,
        })
    }

    fn persist_credential(&self, kind: TokenKind, credential: &StoredCredential) {
        let path = &self.credential_files[&kind];

        let result = serde_json::to_string_pretty(credential)
            .map_err(std::io::Error::other)
            .and_then(|content| std::fs::write(path, content));

        match result {
            Ok(()) => info!("{} credential refreshed and saved", kind.label()),
            Err(e) => warn!(
                "Failed to persist refreshed {} credential to {}: {e}",
                kind.label(),
                path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn credential(expires_at: Option<i64>) -> StoredCredential {
        StoredCredential {
            access_token: "token-abc".to_string(),
            refresh_token: Some("refresh-xyz".to_string()),
            token_uri: Some("https://example.com/oauth/token".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            expires_at,
        }
    }

    #[test]
    fn test_expiry_check_honors_margin() {
        let now = 1_700_000_000;
        assert!(credential(Some(now - 10)).is_expired(now));
        assert!(credential(Some(now + REFRESH_MARGIN_SECS - 1)).is_expired(now));
        assert!(!credential(Some(now + REFRESH_MARGIN_SECS + 60)).is_expired(now));
    }

    #[test]
    fn test_credential_without_expiry_never_expires() {
        assert!(!credential(None).is_expired(1_700_000_000));
    }

    #[test]
    fn test_refresh_requires_full_material() {
        let mut partial = credential(Some(0));
        partial.token_uri = None;
        assert!(!partial.can_refresh());
        assert!(credential(Some(0)).can_refresh());
    }

    #[tokio::test]
    async fn test_missing_credential_file_requires_authentication() {
        let temp_dir = tempdir().unwrap();
        let provider = TokenProvider::new(
            temp_dir.path().join("missing_strava.json"),
            temp_dir.path().join("missing_drive.json"),
        );

        let result = provider.get_valid_token(TokenKind::Activity).await;
        assert!(matches!(
            result,
            Err(AuthError::AuthenticationRequired("activity API"))
        ));
    }

    #[tokio::test]
    async fn test_valid_credential_returned_without_refresh() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("strava_token.json");
        let far_future = Utc::now().timestamp() + 3600;
        std::fs::write(
            &path,
            serde_json::to_string(&credential(Some(far_future))).unwrap(),
        )
        .unwrap();

        let provider = TokenProvider::new(path, temp_dir.path().join("drive_token.json"));

        let token = provider.get_valid_token(TokenKind::Activity).await.unwrap();
        assert_eq!(token, "token-abc");
    }

    #[tokio::test]
    async fn test_expired_credential_without_refresh_token_requires_authentication() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("strava_token.json");
        let mut stale = credential(Some(0));
        stale.refresh_token = None;
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let provider = TokenProvider::new(path, temp_dir.path().join("drive_token.json"));

        let result = provider.get_valid_token(TokenKind::Activity).await;
        assert!(matches!(
            result,
            Err(AuthError::AuthenticationRequired("activity API"))
        ));
    }
}
