//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// A required request field is missing or blank
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Shorthand for a missing required field
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("missing required field `{field}`"))
    }

    /// Whether the error was caused by the caller rather than the provider
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::WebhookSignature(_) | Self::WebhookParse(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(msg) => msg,
            Self::Stripe(_) => "Payment processing failed. Please try again.",
            Self::WebhookSignature(_) | Self::WebhookParse(_) => "Webhook rejected.",
            Self::Config(_) => "Service configuration error.",
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        Self::Stripe(err.to_string())
    }
}
