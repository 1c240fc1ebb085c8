//! Payment Provider Abstraction
//!
//! The gateway and webhook handlers only talk to Stripe through
//! [`BillingProvider`], so the find-or-create flows can be exercised against
//! an in-memory provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Metadata key carrying our user id on Stripe objects
pub const META_USER_ID: &str = "userId";
/// Metadata key carrying the user's email on Stripe objects
pub const META_EMAIL: &str = "email";

/// Status string Stripe uses for intents waiting on a payment method
pub const REQUIRES_PAYMENT_METHOD: &str = "requires_payment_method";

/// A Stripe customer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// A payment intent or setup intent, reduced to what the client needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

impl Intent {
    /// Whether the client can resume this intent by supplying a payment method
    pub fn is_resumable(&self) -> bool {
        self.status == REQUIRES_PAYMENT_METHOD && self.client_secret.is_some()
    }
}

/// A subscription as returned to the client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub trial_end: Option<i64>,
    /// Client secret of the first invoice's payment intent, if any
    pub client_secret: Option<String>,
}

/// A checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer_id: Option<String>,
}

/// A price offered on the pricing page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub id: String,
    pub lookup_key: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub product: Option<String>,
}

/// Parameters for creating a customer
#[derive(Clone, Debug, Default)]
pub struct NewCustomer {
    pub email: String,
    pub name: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating a subscription
#[derive(Clone, Debug, Default)]
pub struct NewSubscription {
    pub customer_id: String,
    pub price_id: String,
    /// Trial length; `None` creates the subscription with incomplete payment
    pub trial_period_days: Option<u32>,
    pub default_payment_method: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating a setup intent
#[derive(Clone, Debug, Default)]
pub struct NewSetupIntent {
    pub customer_id: String,
    pub payment_method_types: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating a subscription-mode checkout session
#[derive(Clone, Debug, Default)]
pub struct NewCheckoutSession {
    pub price_id: String,
    pub customer_email: Option<String>,
    pub client_reference_id: Option<String>,
    /// Unix timestamp at which the trial ends
    pub trial_end: Option<i64>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Payment provider trait
///
/// Each method is one round trip to the provider. Create operations take an
/// idempotency key so that repeated or concurrent requests converge on the
/// same provider object.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Customers registered with `email`, in provider order
    async fn find_customers_by_email(&self, email: &str) -> Result<Vec<Customer>>;

    async fn create_customer(&self, params: NewCustomer, idempotency_key: &str) -> Result<Customer>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer>;

    async fn list_payment_intents(&self, customer_id: &str) -> Result<Vec<Intent>>;

    async fn list_setup_intents(&self, customer_id: &str) -> Result<Vec<Intent>>;

    async fn create_setup_intent(
        &self,
        params: NewSetupIntent,
        idempotency_key: &str,
    ) -> Result<Intent>;

    async fn create_subscription(
        &self,
        params: NewSubscription,
        idempotency_key: &str,
    ) -> Result<Subscription>;

    async fn create_checkout_session(&self, params: NewCheckoutSession) -> Result<CheckoutSession>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession>;

    /// Create a billing portal session and return its URL
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;

    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>>;

    /// Make `payment_method_id` the default for the customer's invoices
    async fn set_customer_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()>;

    /// Payment method attached to a payment intent, if any
    async fn payment_intent_payment_method(&self, payment_intent_id: &str)
    -> Result<Option<String>>;

    async fn set_subscription_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<()>;
}
