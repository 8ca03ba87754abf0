//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use order_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout saga error.
    Checkout(CheckoutError),
    /// Order store error outside the saga.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, serde_json::Value) {
    (status, serde_json::json!({ "error": message }))
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, serde_json::Value) {
    match &err {
        CheckoutError::InvalidRequest(msg) => {
            error_body(StatusCode::BAD_REQUEST, msg.clone())
        }
        // Business rejection: the order exists but ended cancelled. The
        // caller may retry with different payment details.
        CheckoutError::PaymentRejected { order_id, failure } => (
            StatusCode::PAYMENT_REQUIRED,
            serde_json::json!({
                "success": false,
                "message": failure.message(),
                "order_id": order_id.as_i64(),
            }),
        ),
        CheckoutError::Store(store_err) => store_error_to_response_ref(store_err, &err),
        CheckoutError::ReconciliationAnomaly { .. } => {
            tracing::error!(error = %err, "checkout left an order needing reconciliation");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, serde_json::Value) {
    match &err {
        StoreError::InvalidStatusTransition { .. } | StoreError::IdempotencyKeyConflict { .. } => {
            error_body(StatusCode::CONFLICT, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "order store error");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn store_error_to_response_ref(
    store_err: &StoreError,
    outer: &CheckoutError,
) -> (StatusCode, serde_json::Value) {
    match store_err {
        StoreError::InvalidStatusTransition { .. } | StoreError::IdempotencyKeyConflict { .. } => {
            error_body(StatusCode::CONFLICT, outer.to_string())
        }
        _ => {
            tracing::error!(error = %outer, "order store error during checkout");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, outer.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
