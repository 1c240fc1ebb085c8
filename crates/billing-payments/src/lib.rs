//! # billing-payments
//!
//! Stripe checkout, subscription and webhook handling for billing-gateway.
//!
//! ## Flows
//!
//! ### 1. Stripe Checkout (Hosted)
//!
//! **Flow:** pricing page → `create_checkout_session` → 303 to Stripe's
//! hosted page → back to `<client_url>/success?session_id=...` →
//! `checkout_success` resolves the customer.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Front-end  │────▶│  Stripe Hosted  │────▶│  Front-end  │
//! │  (pricing)  │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//! ```
//!
//! ### 2. Stripe Elements (Embedded)
//!
//! The front-end confirms a client secret handed out by
//! `create_no_trial_subscription` (pay now) or `create_setup_intent` (save a
//! card, then `create_free_trial_subscription`). Both look the customer up
//! by email first and never create a second customer for the same address.
//!
//! ### 3. Webhooks
//!
//! `WebhookDispatcher::process` verifies the signature, then runs at most
//! one handler per event.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use billing_payments::{BillingConfig, BillingGateway, CheckoutRequest, StripeClient};
//!
//! let config = Arc::new(BillingConfig::from_env()?);
//! let provider = Arc::new(StripeClient::new(&config.secret_key));
//! let gateway = BillingGateway::new(provider, config);
//!
//! let session = gateway.create_checkout_session(CheckoutRequest {
//!     price: Some("price_123".into()),
//!     email: Some("user@example.com".into()),
//!     user_id: Some("user_1".into()),
//! }).await?;
//!
//! // Redirect user to: session.url
//! ```

mod config;
mod error;
mod gateway;
mod provider;
mod stripe_client;
mod webhook;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use config::{BillingConfig, DEFAULT_WEBHOOK_TOLERANCE_SECS};
pub use error::{PaymentError, Result};
pub use gateway::{
    BillingGateway, CheckoutRequest, FreeTrialSubscriptionRequest, IntentOutcome,
    NoTrialSubscriptionRequest, SetupIntentRequest, TRIAL_DAYS, customer_idempotency_key,
    setup_intent_idempotency_key, subscription_idempotency_key,
    trial_subscription_idempotency_key,
};
pub use provider::{
    BillingProvider, CheckoutSession, Customer, Intent, NewCheckoutSession, NewCustomer,
    NewSetupIntent, NewSubscription, Price, Subscription,
};
pub use stripe_client::StripeClient;
pub use webhook::{
    Dispatch, EventHandlers, HandledEvent, InvoiceObject, LOGGED_EVENTS, ProviderEventHandlers,
    SetupIntentObject, SubscriptionObject, WebhookDispatcher, WebhookEvent, WebhookVerifier,
};
