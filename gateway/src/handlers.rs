//! HTTP handlers for the intent gateway (C9, §4.6).
//!
//! Each handler assigns a request fingerprint if the client didn't supply
//! one, stamps `user_id` from the `X-User-Id` header, and publishes onto
//! the appropriate topic keyed by that fingerprint. Neither handler waits
//! for the booking pipeline to resolve — the API is fire-and-acknowledge
//! (§1 Non-goals: "synchronous confirmation to the client").

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use booking_core::bus::topics;
use booking_core::{BookingIntent, CancellationIntent, EventId, RequestFingerprint, UserId};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::state::AppState;

/// Request body for `POST /bookings`.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Client-supplied idempotency key. Generated by the gateway if absent.
    #[serde(default)]
    pub request_id: Option<String>,
    /// The event being booked against.
    pub event_id: String,
    /// Number of seats requested. Must be positive.
    pub seats: u32,
    /// Optional price hint; the booking consumer authoritatively re-reads
    /// price from the price cache at persistence time (§9).
    #[serde(default)]
    pub price: Option<f64>,
}

/// Request body for `DELETE /bookings`.
#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    /// RF-keyed cancel: the request id of the booking to cancel.
    #[serde(default)]
    pub booking_request_id: Option<String>,
    /// DB-keyed cancel: the surrogate id of the booking to cancel.
    #[serde(default)]
    pub booking_id: Option<String>,
    /// The event the cancelled booking was against.
    pub event_id: String,
    /// Seats to restore. May be zero if unknown to the caller (§3).
    pub seats: u32,
}

/// The `202 Accepted` response body shared by both endpoints (§6).
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    /// Always `"accepted"` — the gateway never reports the pipeline's
    /// eventual terminal state (§7).
    pub status: &'static str,
    /// The request fingerprint assigned to this intent.
    pub request_id: String,
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, GatewayError> {
    let value = headers
        .get("X-User-Id")
        .ok_or(GatewayError::Unauthenticated)?
        .to_str()
        .map_err(|_| GatewayError::Unauthenticated)?
        .trim();

    if value.is_empty() {
        return Err(GatewayError::Unauthenticated);
    }

    Ok(UserId::new(value.to_string()))
}

/// `POST /bookings` (§4.6, §6): publish a booking intent onto
/// `bookings.requests`.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] if `X-User-Id` is missing, or
/// [`GatewayError::MalformedRequest`] if `seats` is zero, or
/// [`GatewayError::PublishFailed`] if the bus publish fails.
pub async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), GatewayError> {
    let user_id = user_id_from_headers(&headers)?;

    if request.seats == 0 {
        return Err(GatewayError::MalformedRequest("seats must be positive".to_string()));
    }

    let request_fingerprint = request
        .request_id
        .map(RequestFingerprint::new)
        .unwrap_or_else(RequestFingerprint::generate);

    let intent = BookingIntent {
        request_fingerprint: request_fingerprint.clone(),
        event_id: EventId::new(request.event_id),
        user_id,
        seats: request.seats,
        price: request.price,
    };

    let payload = serde_json::to_vec(&intent)
        .map_err(|e| GatewayError::MalformedRequest(format!("failed to encode intent: {e}")))?;

    state
        .bus
        .publish(topics::BOOKINGS_REQUESTS, request_fingerprint.as_str(), &payload)
        .await
        .map_err(|e| GatewayError::PublishFailed(e.to_string()))?;

    metrics::counter!("gateway.bookings_published").increment(1);
    tracing::info!(request_id = %request_fingerprint, "booking intent published");

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            request_id: request_fingerprint.to_string(),
        }),
    ))
}

/// `DELETE /bookings` (§4.6, §6): publish a cancellation intent onto
/// `cancel.requests`.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] if `X-User-Id` is missing, or
/// [`GatewayError::MalformedRequest`] if neither `booking_request_id` nor
/// `booking_id` is present, or [`GatewayError::PublishFailed`] if the bus
/// publish fails.
pub async fn cancel_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CancelBookingRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), GatewayError> {
    // Require the header (§6: "401 on missing/invalid auth header") even
    // though the Cancellation Intent wire schema (§3) carries no user_id.
    let _user_id = user_id_from_headers(&headers)?;

    if request.booking_request_id.is_none() && request.booking_id.is_none() {
        return Err(GatewayError::MalformedRequest(
            "one of booking_request_id or booking_id is required".to_string(),
        ));
    }

    // The bus partition key (also the RF-keyed identity when present).
    // §4.6 assigns an RF even on the cancel path so the message can be
    // keyed and so the inventory-update consumer has a dedup key for the
    // compensating delta even on a booking_id-keyed cancel (§4.4, §4.5).
    let request_fingerprint = request
        .booking_request_id
        .clone()
        .map(RequestFingerprint::new)
        .unwrap_or_else(RequestFingerprint::generate);

    let intent = CancellationIntent {
        request_fingerprint: request.booking_request_id.map(RequestFingerprint::new),
        booking_id: request.booking_id,
        event_id: EventId::new(request.event_id),
        seats: request.seats,
    };

    let payload = serde_json::to_vec(&intent)
        .map_err(|e| GatewayError::MalformedRequest(format!("failed to encode intent: {e}")))?;

    state
        .bus
        .publish(topics::CANCEL_REQUESTS, request_fingerprint.as_str(), &payload)
        .await
        .map_err(|e| GatewayError::PublishFailed(e.to_string()))?;

    metrics::counter!("gateway.cancellations_published").increment(1);
    tracing::info!(request_id = %request_fingerprint, "cancellation intent published");

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            request_id: request_fingerprint.to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_header_missing_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(matches!(
            user_id_from_headers(&headers),
            Err(GatewayError::Unauthenticated)
        ));
    }

    #[test]
    fn user_id_header_blank_is_unauthenticated() {
        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", "   ".parse().unwrap());
        assert!(matches!(
            user_id_from_headers(&headers),
            Err(GatewayError::Unauthenticated)
        ));
    }

    #[test]
    fn user_id_header_present_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", "u1".parse().unwrap());
        let user_id = user_id_from_headers(&headers).expect("header present");
        assert_eq!(user_id.as_str(), "u1");
    }
}
