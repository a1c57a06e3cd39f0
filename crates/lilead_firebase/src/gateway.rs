//! Multicast push delivery
//!
//! [`PushGateway`] is the contract the reminder dispatcher depends on. The FCM
//! backed implementation, [`FcmPushGateway`], sends one request per token with
//! bounded concurrency and reports an outcome for every token it was given.

use crate::auth::{service_account_key, FirebaseAuth};
use crate::client::{
    FcmClient, FcmMessage, FirebaseError, Message, Notification, RetryPolicy, DEFAULT_FCM_BASE_URL,
};
use futures::stream::{self, StreamExt};
use lilead_common::NotificationPayload;
use lilead_config::FirebaseConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single token could not be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// The token is no longer registered with FCM
    Unregistered,
    InvalidArgument,
    SenderIdMismatch,
    QuotaExceeded,
    Unavailable,
    Internal,
    ThirdPartyAuth,
    /// FCM rejected our access token (HTTP 401/403)
    Unauthenticated,
    /// The request never produced an HTTP response
    Transport,
    Unknown,
}

impl DeliveryErrorKind {
    /// Classifies an FCM error response.
    ///
    /// `code` is the FCM error code (or Google status) from the response body.
    pub fn classify(status: u16, code: Option<&str>) -> Self {
        match code {
            Some("UNREGISTERED") => DeliveryErrorKind::Unregistered,
            Some("INVALID_ARGUMENT") => DeliveryErrorKind::InvalidArgument,
            Some("SENDER_ID_MISMATCH") => DeliveryErrorKind::SenderIdMismatch,
            Some("QUOTA_EXCEEDED") | Some("RESOURCE_EXHAUSTED") => DeliveryErrorKind::QuotaExceeded,
            Some("UNAVAILABLE") => DeliveryErrorKind::Unavailable,
            Some("INTERNAL") => DeliveryErrorKind::Internal,
            Some("THIRD_PARTY_AUTH_ERROR") => DeliveryErrorKind::ThirdPartyAuth,
            Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED") => {
                DeliveryErrorKind::Unauthenticated
            }
            _ if status == 401 || status == 403 => DeliveryErrorKind::Unauthenticated,
            _ if status == 404 => DeliveryErrorKind::Unregistered,
            _ => DeliveryErrorKind::Unknown,
        }
    }

    /// Permanent failures mean the token should be removed from the registry.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DeliveryErrorKind::Unregistered
                | DeliveryErrorKind::InvalidArgument
                | DeliveryErrorKind::SenderIdMismatch
        )
    }

    /// Worth another request with the same access token.
    pub fn is_retryable(&self) -> bool {
        !self.is_permanent() && *self != DeliveryErrorKind::Unauthenticated
    }
}

/// Result of delivering one notification to one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub token: String,
    pub delivered: bool,
    pub error_kind: Option<DeliveryErrorKind>,
    /// FCM message name on success
    pub message_id: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(token: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            delivered: true,
            error_kind: None,
            message_id,
        }
    }

    pub fn failed(token: impl Into<String>, kind: DeliveryErrorKind) -> Self {
        Self {
            token: token.into(),
            delivered: false,
            error_kind: Some(kind),
            message_id: None,
        }
    }

    /// True when the token should be unregistered.
    pub fn is_permanent_failure(&self) -> bool {
        self.error_kind.is_some_and(|k| k.is_permanent())
    }
}

/// Whole-call failures of a multicast delivery. No outcomes are produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("push gateway is not configured: {0}")]
    NotConfigured(String),

    #[error("push gateway unavailable: {0}")]
    Unavailable(String),

    #[error("push gateway timed out after {0:?}")]
    Timeout(Duration),
}

/// Multicast push delivery as seen by the dispatcher.
pub trait PushGateway: Send + Sync {
    /// Prepares credentials ahead of the first delivery.
    fn initialize(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn is_enabled(&self) -> bool;

    /// Delivers `payload` to every token, returning one outcome per token in input order.
    fn deliver_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> impl Future<Output = Result<Vec<DeliveryOutcome>, GatewayError>> + Send;
}

/// FCM HTTP v1 implementation of [`PushGateway`]
#[derive(Debug)]
pub struct FcmPushGateway {
    client: Option<FcmClient>,
    disabled_reason: Option<String>,
    max_batch_size: usize,
    concurrency: usize,
}

impl FcmPushGateway {
    /// Builds the gateway from configuration.
    ///
    /// Missing or unusable credentials never fail startup: the gateway is
    /// returned disabled and every delivery reports `NotConfigured`.
    pub async fn from_config(config: Option<&FirebaseConfig>) -> Self {
        let Some(config) = config else {
            warn!("No Firebase configuration found, push delivery disabled");
            return Self::disabled("firebase configuration missing");
        };

        if !config.has_credentials() {
            warn!("Firebase credentials incomplete, push delivery disabled");
            return Self::disabled("firebase credentials incomplete");
        }

        match Self::build_client(config).await {
            Ok(client) => {
                info!(
                    project_id = config.project_id.as_deref().unwrap_or_default(),
                    "Firebase push gateway configured"
                );
                Self::with_client(client, config.max_batch_size, config.concurrency)
            }
            Err(e) => {
                warn!(error = %e, "Failed to set up Firebase client, push delivery disabled");
                Self::disabled(e.to_string())
            }
        }
    }

    async fn build_client(config: &FirebaseConfig) -> Result<FcmClient, FirebaseError> {
        let key = service_account_key(config).await?;
        let project_id = config
            .project_id
            .clone()
            .or_else(|| key.project_id.clone())
            .unwrap_or_default();

        FcmClient::new(
            config.api_base_url.as_deref().unwrap_or(DEFAULT_FCM_BASE_URL),
            &project_id,
            FirebaseAuth::service_account(key),
            Duration::from_secs(config.request_timeout_secs),
            RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        )
    }

    /// A gateway that rejects every delivery with `NotConfigured`.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            client: None,
            disabled_reason: Some(reason.into()),
            max_batch_size: 1,
            concurrency: 1,
        }
    }

    pub fn with_client(client: FcmClient, max_batch_size: usize, concurrency: usize) -> Self {
        Self {
            client: Some(client),
            disabled_reason: None,
            max_batch_size: max_batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    fn client(&self) -> Result<&FcmClient, GatewayError> {
        self.client.as_ref().ok_or_else(|| {
            GatewayError::NotConfigured(
                self.disabled_reason
                    .clone()
                    .unwrap_or_else(|| "no client".to_string()),
            )
        })
    }

    async fn deliver_one(
        client: &FcmClient,
        index: usize,
        token: &str,
        payload: &NotificationPayload,
        access_token: &str,
    ) -> (usize, DeliveryOutcome) {
        let message = FcmMessage {
            message: Message {
                token: token.to_string(),
                notification: Notification {
                    title: payload.title.clone(),
                    body: payload.body.clone(),
                },
                data: payload.data.clone(),
            },
        };

        let outcome = match client.send_with_retry(&message, access_token).await {
            Ok(name) => DeliveryOutcome::delivered(token, name),
            Err(e) => {
                let kind = e.kind();
                debug!(error = %e, ?kind, "Delivery to token failed");
                DeliveryOutcome::failed(token, kind)
            }
        };
        (index, outcome)
    }
}

impl PushGateway for FcmPushGateway {
    async fn initialize(&self) -> Result<(), GatewayError> {
        let Some(client) = self.client.as_ref() else {
            debug!("Push gateway disabled, nothing to initialize");
            return Ok(());
        };

        client
            .access_token()
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }

    fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn deliver_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<DeliveryOutcome>, GatewayError> {
        let client = self.client()?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let access_token = client
            .access_token()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(tokens.len());
        for (batch_index, batch) in tokens.chunks(self.max_batch_size).enumerate() {
            let offset = batch_index * self.max_batch_size;
            let sends: Vec<_> = batch
                .iter()
                .enumerate()
                .map(|(i, token)| {
                    Self::deliver_one(client, offset + i, token, payload, &access_token)
                })
                .collect();

            let mut results: Vec<(usize, DeliveryOutcome)> = stream::iter(sends)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            results.sort_by_key(|(index, _)| *index);

            debug!(
                batch = batch_index,
                token_count = batch.len(),
                "FCM batch sent"
            );
            outcomes.extend(results.into_iter().map(|(_, outcome)| outcome));
        }

        let rejected = outcomes
            .iter()
            .any(|o| o.error_kind == Some(DeliveryErrorKind::Unauthenticated));
        if rejected {
            warn!("FCM rejected the access token, dropping it from the cache");
            client.invalidate_access_token().await;
        }

        if outcomes.iter().any(|o| o.delivered) {
            return Ok(outcomes);
        }
        if rejected {
            return Err(GatewayError::Unavailable(
                "FCM rejected the access token".to_string(),
            ));
        }
        // Nothing delivered and nothing to clean up: the provider itself is failing.
        if !outcomes.iter().any(|o| o.is_permanent_failure()) {
            return Err(GatewayError::Unavailable(format!(
                "all {} deliveries failed transiently",
                outcomes.len()
            )));
        }

        Ok(outcomes)
    }
}
