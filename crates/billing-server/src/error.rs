//! HTTP error mapping

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use billing_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by every handler
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub PaymentError);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            PaymentError::Validation(_)
            | PaymentError::WebhookSignature(_)
            | PaymentError::WebhookParse(_) => StatusCode::BAD_REQUEST,
            PaymentError::Stripe(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match &self.0 {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
            PaymentError::WebhookParse(_) => "INVALID_PAYLOAD",
            PaymentError::Stripe(_) => "PROVIDER_ERROR",
            PaymentError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self.0 {
            // Stripe's dashboard shows the body of failed deliveries verbatim.
            PaymentError::WebhookSignature(msg) | PaymentError::WebhookParse(msg) => {
                tracing::warn!(error = %msg, "Webhook rejected");
                (
                    status,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    format!("Webhook Error: {msg}"),
                )
                    .into_response()
            }
            err => {
                if err.is_client_error() {
                    tracing::debug!(error = %err, "Request rejected");
                } else {
                    tracing::error!(error = %err, "Billing request failed");
                }
                let body = ErrorResponse {
                    error: err.user_message().to_string(),
                    code: self.error_code().to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
