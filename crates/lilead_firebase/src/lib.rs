//! Firebase Cloud Messaging integration for Lilead
//!
//! This crate delivers push notifications through the Firebase Cloud Messaging
//! (FCM) HTTP v1 API.
//!
//! # Features
//!
//! - Authentication with Firebase using service account credentials, either a
//!   key file or inline client email and private key
//! - Access token caching
//! - Multicast delivery with per-token outcomes, batching and bounded concurrency
//! - Classification of FCM errors into permanent and transient failures
//! - Retries with exponential backoff for transient failures
//!
//! # Example
//!
//! ```rust,no_run
//! use lilead_common::NotificationPayload;
//! use lilead_config::AppConfig;
//! use lilead_firebase::{FcmPushGateway, PushGateway};
//!
//! async fn notify(config: &AppConfig) {
//!     let gateway = FcmPushGateway::from_config(config.firebase.as_ref()).await;
//!     let payload = NotificationPayload {
//!         title: "Hello".to_string(),
//!         body: "World".to_string(),
//!         data: Default::default(),
//!     };
//!
//!     match gateway.deliver_multicast(&["device-token".to_string()], &payload).await {
//!         Ok(outcomes) => println!("{} outcomes", outcomes.len()),
//!         Err(e) => eprintln!("push unavailable: {e}"),
//!     }
//! }
//! ```

pub mod auth;
pub mod client;
pub mod gateway;

pub use auth::{FirebaseAuth, FCM_SCOPE};
pub use client::{FcmClient, FirebaseError, RetryPolicy, DEFAULT_FCM_BASE_URL};
pub use gateway::{DeliveryErrorKind, DeliveryOutcome, FcmPushGateway, GatewayError, PushGateway};
