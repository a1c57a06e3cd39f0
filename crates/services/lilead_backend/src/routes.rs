use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::app_state::AppState;
use crate::handlers::{register_token_handler, status_handler, unregister_token_handler};

/// Create the notification routes for the API
///
/// - `GET /notifications/status` starts the reminder scheduler if needed and reports it
/// - `POST /notifications/register` registers a device token
/// - `DELETE /notifications/register` removes a device token
pub fn routes(state: AppState) -> Router {
    info!("Notification routes initialized");

    Router::new()
        .route("/notifications/status", get(status_handler))
        .route(
            "/notifications/register",
            post(register_token_handler).delete(unregister_token_handler),
        )
        .with_state(state)
}

/// The full application router, with every route under `/api`
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Welcome to the Lilead API!" }))
        .nest("/api", routes(state))
}
