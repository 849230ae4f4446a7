//! Shared Axum application state for the gateway.

use std::sync::Arc;

use booking_core::MessageBus;

/// State shared across every gateway handler: just the bus, since the
/// gateway is a thin HTTP-to-bus adapter (§1).
#[derive(Clone)]
pub struct AppState {
    /// The message bus the gateway publishes booking and cancellation
    /// intents onto.
    pub bus: Arc<dyn MessageBus>,
}

impl AppState {
    /// Construct gateway state wrapping a connected bus.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}
