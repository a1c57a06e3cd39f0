//! Host process for the Lilead reminder subsystem
//!
//! Exposes the notification endpoints and owns the startup wiring of stores,
//! push gateway, dispatcher and scheduler.

pub mod app_state;
pub mod handlers;
pub mod routes;

pub use app_state::AppState;
pub use routes::{app, routes};
