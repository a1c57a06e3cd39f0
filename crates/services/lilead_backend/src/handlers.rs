//! HTTP handlers for the notification endpoints
//!
//! Every response uses the [`ApiResponse`] envelope: `success`, plus either
//! `data` or `error`. The user id comes from the request body.

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lilead_common::{database_error, validation_error, HttpStatusCode, LileadError, Platform};
use lilead_db::{DbError, DeviceTokenRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::app_state::AppState;

/// Response envelope shared by all endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, message: &str) -> Response {
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.to_string()),
        })
        .into_response()
    }
}

/// Error half of a handler result
pub struct ApiError(LileadError);

impl From<LileadError> for ApiError {
    fn from(err: LileadError) -> Self {
        Self(err)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidInput(msg) => Self(validation_error(msg)),
            other => Self(database_error(other)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(validation_error(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
            message: None,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `running` or `stopped`
    pub scheduler: String,
    pub push_enabled: bool,
    pub tick_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub user_id: String,
    pub token: String,
    pub platform: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterTokenResponse {
    pub registered: bool,
    pub user_id: String,
    pub platform: Platform,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnregisterTokenResponse {
    /// False when the token was not registered
    pub unregistered: bool,
}

/// Starts the reminder scheduler if needed and reports its state
///
/// Safe to call any number of times; only the first call while stopped starts the loop.
#[axum::debug_handler]
pub async fn status_handler(State(state): State<AppState>) -> Response {
    if state.scheduler.start().await {
        info!("Reminder scheduler started from status endpoint");
    }

    let running = state.scheduler.is_running().await;
    ApiResponse::ok(
        StatusResponse {
            scheduler: if running { "running" } else { "stopped" }.to_string(),
            push_enabled: state.push_enabled(),
            tick_interval_secs: state.config.scheduler.tick_interval_secs,
        },
        "Notification system status",
    )
}

/// Registers (or reassigns) a device token
///
/// # Responses
///
/// - 200 OK: Token registered
/// - 400 Bad Request: Empty user id or token, unknown platform, malformed body
/// - 500 Internal Server Error: Store failure
#[axum::debug_handler]
pub async fn register_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterTokenRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;

    if payload.user_id.trim().is_empty() {
        return Err(validation_error("user_id is required").into());
    }
    if payload.token.trim().is_empty() {
        return Err(validation_error("Token is required").into());
    }
    let platform: Platform = payload.platform.parse().map_err(validation_error)?;

    let device = state
        .devices
        .register(&payload.user_id, &payload.token, platform)
        .await?;

    info!(user_id = %device.user_id, %platform, "Device token registered");
    Ok(ApiResponse::ok(
        RegisterTokenResponse {
            registered: true,
            user_id: device.user_id,
            platform: device.platform,
        },
        "Device token registered successfully",
    ))
}

/// Removes a device token
///
/// An unknown token is not an error: the response carries `unregistered: false`.
#[axum::debug_handler]
pub async fn unregister_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<UnregisterTokenRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;

    if payload.token.trim().is_empty() {
        return Err(validation_error("Token is required").into());
    }

    let unregistered = match state.devices.unregister(&payload.token).await {
        Ok(()) => true,
        Err(e) if e.is_not_found() => {
            debug!("Token to unregister was not registered");
            false
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ApiResponse::ok(
        UnregisterTokenResponse { unregistered },
        "Device token unregistered successfully",
    ))
}
