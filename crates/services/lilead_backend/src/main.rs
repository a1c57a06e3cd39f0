// File: services/lilead_backend/src/main.rs
use lilead_backend::{app, AppState};
use lilead_common::{log_error, log_result, logging};
use lilead_config::load_config;
use lilead_db::DbClient;
use lilead_firebase::FcmPushGateway;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() {
    // 1. Logging first so every later step is visible
    logging::init();

    // 2. Configuration
    let config = Arc::new(
        log_result(load_config(), "Configuration loaded", "Failed to load config")
            .expect("Failed to load config"),
    );

    // 3. Database pool
    let db = log_result(
        DbClient::new(&config).await,
        "Database pool created",
        "Failed to connect to database",
    )
    .expect("Failed to connect to database");

    // 4. Push gateway; missing credentials only disable delivery
    let gateway = FcmPushGateway::from_config(config.firebase.as_ref()).await;

    // 5. Schema, repositories, dispatcher and scheduler
    let state = log_result(
        AppState::new(config.clone(), db.clone(), gateway).await,
        "Reminder subsystem wired",
        "Failed to initialize database schema",
    )
    .expect("Failed to initialize database schema");

    if config.scheduler.enabled {
        state.scheduler.start().await;
    } else {
        info!("Reminder scheduler disabled, GET /api/notifications/status starts it");
    }

    // 6. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    if let Err(e) = axum::serve(listener, app(state.clone()).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log_error(e, "Server error");
    }

    // 7. Shutdown
    if let Err(e) = state.scheduler.stop().await {
        log_error(e, "Reminder scheduler did not stop cleanly");
    }
    db.close().await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log_error(e, "Failed to listen for Ctrl-C");
        // Keep serving; the process can still be killed.
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}
