//! Gateway error type, bridging request-handling failures to the HTTP
//! responses §4.6/§6 name: `400` on malformed body, `401` on missing/invalid
//! auth header, `503` on bus publish failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors the gateway's handlers can produce.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request body failed to deserialize or validate (§6: "400 on
    /// malformed body").
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    /// The `X-User-Id` header was missing or empty (§6: "401 on
    /// missing/invalid auth header"). Authentication itself is out of
    /// scope (§1); the gateway only requires the header be present.
    #[error("missing or invalid X-User-Id header")]
    Unauthenticated,
    /// Publishing the intent onto the bus failed (§6: "503 on bus publish
    /// failure").
    #[error("failed to publish intent: {0}")]
    PublishFailed(String),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MalformedRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::PublishFailed(reason) => {
                tracing::error!(reason, "bus publish failed");
                (StatusCode::SERVICE_UNAVAILABLE, "bus unavailable".to_string())
            }
        };

        let body = ErrorBody { status: "error", message };
        (status, Json(body)).into_response()
    }
}
