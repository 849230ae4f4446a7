//! The Intent Gateway (C9, §4.6): a thin HTTP-to-bus adapter. It assigns a
//! request fingerprint to inbound booking and cancellation requests, stamps
//! `user_id` from the `X-User-Id` header, and publishes the intent onto
//! `bookings.requests` or `cancel.requests`.
//!
//! Everything downstream of the publish — the state machine, seat
//! contention, persistence, cancellation interleaving — lives in
//! `booking-consumers`; this crate has no knowledge of it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::Config;
pub use error::GatewayError;
pub use state::AppState;

use axum::routing::{delete, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the gateway's Axum router: `POST /bookings` and `DELETE /bookings`
/// (§4.6, §6), plus a liveness check for the process supervisor.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings", delete(handlers::cancel_booking))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
