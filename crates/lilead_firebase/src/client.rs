//! Firebase Cloud Messaging client module
//!
//! This module provides a client for the Firebase Cloud Messaging (FCM) HTTP v1 API.
//! It sends one message per device token, classifies the error bodies FCM returns
//! and retries transient failures with exponential backoff.

use crate::auth::FirebaseAuth;
use crate::gateway::DeliveryErrorKind;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Production FCM endpoint
pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Errors that can occur when interacting with the Firebase Cloud Messaging API
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Error during authentication with Firebase
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to Firebase API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the Firebase API
    #[error("Firebase API error ({status}): {message}")]
    ApiError {
        status: u16,
        /// FCM error code, e.g. `UNREGISTERED`
        code: Option<String>,
        message: String,
    },
}

impl FirebaseError {
    /// Maps the error onto the delivery classification used by the gateway.
    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            FirebaseError::ApiError { status, code, .. } => {
                DeliveryErrorKind::classify(*status, code.as_deref())
            }
            FirebaseError::RequestError(_) => DeliveryErrorKind::Transport,
            FirebaseError::AuthError(_) => DeliveryErrorKind::Unauthenticated,
            FirebaseError::ConfigError(_) => DeliveryErrorKind::Unknown,
        }
    }
}

/// A message to be sent via Firebase Cloud Messaging
///
/// This is the top-level structure that wraps a Message object
/// according to the FCM HTTP v1 API format.
#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    /// The message payload
    pub message: Message,
}

/// The message payload for Firebase Cloud Messaging
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Registration token of the target device
    pub token: String,

    /// The notification to be displayed on the user's device
    pub notification: Notification,

    /// Custom key-value data delivered to the client app
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

/// The notification to be displayed on the user's device
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// The title of the notification
    pub title: String,

    /// The body text of the notification
    pub body: String,
}

/// Response from the Firebase Cloud Messaging API
#[derive(Debug, Deserialize)]
pub struct FcmResponse {
    /// The unique ID of the message
    ///
    /// This is a string in the format "projects/{project_id}/messages/{message_id}"
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    error: FcmErrorStatus,
}

#[derive(Debug, Deserialize)]
struct FcmErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Builds an `ApiError` from a non-success response body.
///
/// The FCM-specific `details[].errorCode` wins over the generic Google `status`.
fn parse_api_error(status: StatusCode, body: &str) -> FirebaseError {
    match serde_json::from_str::<FcmErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .details
                .iter()
                .find_map(|d| d.error_code.clone())
                .or(parsed.error.status);
            FirebaseError::ApiError {
                status: status.as_u16(),
                code,
                message: parsed.error.message,
            }
        }
        Err(_) => FirebaseError::ApiError {
            status: status.as_u16(),
            code: None,
            message: body.to_string(),
        },
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Base delay between retries. Actual delay = base * 2^attempt.
    pub base_delay: Duration,
    /// Hard cap on the computed delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^attempt is computed with a checked shift so attempts >= 32 saturate.
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Client for the Firebase Cloud Messaging HTTP v1 API
///
/// Holds one pooled HTTP client and the token source; cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct FcmClient {
    /// HTTP client for making requests to the FCM API
    client: Client,
    send_url: String,
    auth: FirebaseAuth,
    retry: RetryPolicy,
}

impl FcmClient {
    /// Creates a new client for `project_id`
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, [`DEFAULT_FCM_BASE_URL`] in production
    /// * `project_id` - The Firebase project messages are sent from
    /// * `auth` - Source of bearer tokens
    /// * `request_timeout` - Upper bound for a single HTTP request
    /// * `retry` - Backoff policy for transient failures
    ///
    /// # Errors
    ///
    /// Returns `FirebaseError::RequestError` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        project_id: &str,
        auth: FirebaseAuth,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, FirebaseError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            base_url.trim_end_matches('/'),
            project_id
        );

        Ok(Self {
            client,
            send_url,
            auth,
            retry,
        })
    }

    /// Returns a bearer token for the next batch of requests.
    pub async fn access_token(&self) -> Result<String, FirebaseError> {
        self.auth.access_token().await
    }

    /// Forgets the cached bearer token so the next call fetches a fresh one.
    pub async fn invalidate_access_token(&self) {
        self.auth.invalidate().await
    }

    /// Sends a single message and returns the FCM message name
    ///
    /// A success status means FCM accepted the message; the name is `None`
    /// when the response body cannot be read.
    ///
    /// # Errors
    ///
    /// * `FirebaseError::RequestError` when the request cannot be completed
    /// * `FirebaseError::ApiError` when FCM rejects the message
    pub async fn send_message(
        &self,
        message: &FcmMessage,
        access_token: &str,
    ) -> Result<Option<String>, FirebaseError> {
        let response = self
            .client
            .post(&self.send_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(parse_api_error(status, &error_text));
        }

        match response.json::<FcmResponse>().await {
            Ok(fcm_response) => Ok(Some(fcm_response.name)),
            Err(e) => {
                warn!(error = %e, "FCM accepted the message but its response was unreadable");
                Ok(None)
            }
        }
    }

    /// Sends a message, retrying transient failures according to the retry policy.
    pub async fn send_with_retry(
        &self,
        message: &FcmMessage,
        access_token: &str,
    ) -> Result<Option<String>, FirebaseError> {
        let mut attempt = 0;
        loop {
            match self.send_message(message, access_token).await {
                Ok(name) => return Ok(name),
                Err(e) if e.kind().is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "FCM send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(error = %e, "FCM send failed");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_details() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [
                    {
                        "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                        "errorCode": "UNREGISTERED"
                    }
                ]
            }
        }"#;

        let err = parse_api_error(StatusCode::NOT_FOUND, body);
        match &err {
            FirebaseError::ApiError { status, code, message } => {
                assert_eq!(*status, 404);
                assert_eq!(code.as_deref(), Some("UNREGISTERED"));
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), DeliveryErrorKind::Unregistered);
    }

    #[test]
    fn test_error_code_falls_back_to_status() {
        let body = r#"{"error":{"code":503,"message":"busy","status":"UNAVAILABLE"}}"#;

        let err = parse_api_error(StatusCode::SERVICE_UNAVAILABLE, body);
        assert_eq!(err.kind(), DeliveryErrorKind::Unavailable);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_unparseable_body() {
        let err = parse_api_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        assert!(matches!(
            &err,
            FirebaseError::ApiError { status: 502, code: None, .. }
        ));
        assert_eq!(err.kind(), DeliveryErrorKind::Unknown);
    }

    #[test]
    fn test_bare_404_is_unregistered() {
        let err = parse_api_error(StatusCode::NOT_FOUND, "");
        assert_eq!(err.kind(), DeliveryErrorKind::Unregistered);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(500));
    }

    #[test]
    fn test_message_serialization() {
        let message = FcmMessage {
            message: Message {
                token: "device-token".to_string(),
                notification: Notification {
                    title: "Hello".to_string(),
                    body: "World".to_string(),
                },
                data: HashMap::from([("type".to_string(), "reminder".to_string())]),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["message"]["token"], "device-token");
        assert_eq!(json["message"]["notification"]["title"], "Hello");
        assert_eq!(json["message"]["data"]["type"], "reminder");
    }
}
