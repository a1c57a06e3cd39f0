//! Authentication module for Firebase Cloud Messaging
//!
//! This module turns the configured service account into OAuth2 access tokens
//! for the FCM HTTP v1 API. Tokens are cached and refreshed well before
//! Google's one hour expiry.

use crate::client::FirebaseError;
use lilead_config::FirebaseConfig;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator, ServiceAccountKey};

/// FCM requires the "https://www.googleapis.com/auth/firebase.messaging" scope
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens live for an hour; refresh after 45 minutes.
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(45 * 60);

#[derive(Debug)]
enum TokenSource {
    ServiceAccount(Box<ServiceAccountKey>),
    Static(String),
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// Source of bearer tokens for FCM requests
#[derive(Debug)]
pub struct FirebaseAuth {
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl FirebaseAuth {
    /// Authenticate with a Google service account.
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self {
            source: TokenSource::ServiceAccount(Box::new(key)),
            cached: Mutex::new(None),
        }
    }

    /// Always use the given bearer token. Intended for emulators and tests.
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            cached: Mutex::new(None),
        }
    }

    /// Obtains an OAuth2 access token for Firebase Cloud Messaging
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The private key cannot be parsed
    /// * Authentication with Google's OAuth2 service fails
    /// * No token is returned from the authentication service
    pub async fn access_token(&self) -> Result<String, FirebaseError> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.fetched_at.elapsed() < TOKEN_REFRESH_AFTER {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting new FCM access token for {}", key.client_email);

        let auth = ServiceAccountAuthenticator::builder(key.as_ref().clone())
            .build()
            .await
            .map_err(|e| FirebaseError::AuthError(e.to_string()))?;

        let auth_token = auth
            .token(&[FCM_SCOPE])
            .await
            .map_err(|e| FirebaseError::AuthError(e.to_string()))?;
        let value = match auth_token.token() {
            Some(token) => token.to_string(),
            None => {
                return Err(FirebaseError::AuthError("No token available".to_string()));
            }
        };

        *cached = Some(CachedToken {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drops the cached token, e.g. after FCM rejected it.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

/// Resolves the service account described by `config`
///
/// A `key_path` file wins over inline `client_email` / `private_key` values.
///
/// # Errors
///
/// `FirebaseError::ConfigError` when the credentials are incomplete or the key
/// file cannot be read.
pub async fn service_account_key(config: &FirebaseConfig) -> Result<ServiceAccountKey, FirebaseError> {
    if let Some(key_path) = config.key_path.as_deref().filter(|p| !p.trim().is_empty()) {
        return read_service_account_key(Path::new(key_path))
            .await
            .map_err(|e| {
                FirebaseError::ConfigError(format!(
                    "Failed to read service account key {}: {}",
                    key_path, e
                ))
            });
    }

    let project_id = required(&config.project_id, "project_id")?;
    let client_email = required(&config.client_email, "client_email")?;
    let private_key = required(&config.private_key, "private_key")?;

    // Deserialize rather than build the struct so optional fields keep their defaults.
    serde_json::from_value(serde_json::json!({
        "type": "service_account",
        "project_id": project_id,
        "private_key": private_key,
        "client_email": client_email,
        "token_uri": GOOGLE_TOKEN_URI,
    }))
    .map_err(|e| FirebaseError::ConfigError(format!("Invalid service account: {}", e)))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, FirebaseError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| FirebaseError::ConfigError(format!("Missing {} in FirebaseConfig", name)))
}
