//! Checkout and Subscription Gateway
//!
//! One method per client-facing operation. Each performs one or a few
//! sequential provider calls and hands the result back to the HTTP layer.
//!
//! The no-trial subscription and setup-intent flows share a find-or-create
//! step keyed on the customer's email:
//!
//! ```text
//! search by email ──▶ first match? ──yes──▶ resumable intent? ──yes──▶ Resumed
//!        │                                        │
//!        no                                       no ──▶ CustomerExists
//!        ▼
//! create customer ──▶ create subscription / setup intent ──▶ Created
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::BillingConfig;
use crate::error::{PaymentError, Result};
use crate::provider::{
    BillingProvider, Customer, Intent, META_EMAIL, META_USER_ID,
    NewCheckoutSession, NewCustomer, NewSetupIntent, NewSubscription, Price, Subscription,
};

/// Length of every trial this service grants
pub const TRIAL_DAYS: u32 = 14;

/// Request to create a hosted checkout session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Price to subscribe to
    #[serde(default)]
    pub price: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoTrialSubscriptionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTrialSubscriptionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupIntentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Result of a find-or-create flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentOutcome {
    /// A new customer and intent were created
    Created {
        client_secret: String,
        customer_id: String,
    },

    /// The existing customer has an intent waiting for a payment method
    Resumed {
        client_secret: String,
        customer_id: String,
    },

    /// The email belongs to a customer with nothing to resume
    CustomerExists,
}

/// Stripe-facing operations behind the HTTP routes
#[derive(Clone)]
pub struct BillingGateway {
    provider: Arc<dyn BillingProvider>,
    config: Arc<BillingConfig>,
}

impl BillingGateway {
    pub fn new(provider: Arc<dyn BillingProvider>, config: Arc<BillingConfig>) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }

    /// Prices for the configured lookup keys. An empty list is not an error.
    pub async fn load_prices(&self) -> Result<Vec<Price>> {
        let prices = self.provider.list_prices(&self.config.price_lookup_keys).await?;
        if prices.is_empty() {
            tracing::warn!(
                lookup_keys = ?self.config.price_lookup_keys,
                "No prices found for lookup keys"
            );
        }
        Ok(prices)
    }

    /// Create a subscription-mode checkout session with a two-week trial and
    /// return the hosted page URL
    pub async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String> {
        let price = required(request.price.as_deref(), "price")?;
        let user_id = required(request.user_id.as_deref(), "userId")?;
        let email = non_blank(request.email.as_deref());

        let mut metadata = HashMap::new();
        metadata.insert(META_USER_ID.to_string(), user_id.to_string());
        if let Some(email) = email {
            metadata.insert(META_EMAIL.to_string(), email.to_string());
        }

        let trial_end = Utc::now() + Duration::days(i64::from(TRIAL_DAYS));

        let session = self
            .provider
            .create_checkout_session(NewCheckoutSession {
                price_id: price.to_string(),
                customer_email: email.map(String::from),
                client_reference_id: Some(user_id.to_string()),
                trial_end: Some(trial_end.timestamp()),
                success_url: self.config.success_url(),
                cancel_url: self.config.return_url(),
                metadata,
            })
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(session_id = %session.id, user_id = %user_id, "Created checkout session");
        Ok(url)
    }

    /// Resolve the customer behind a completed checkout session
    pub async fn checkout_success(&self, session_id: Option<&str>) -> Result<Customer> {
        let session_id = required(session_id, "sessionId")?;
        let session = self.provider.retrieve_checkout_session(session_id).await?;

        let customer_id = session.customer_id.ok_or_else(|| {
            PaymentError::Stripe(format!("checkout session {session_id} has no customer"))
        })?;

        self.provider.retrieve_customer(&customer_id).await
    }

    /// Billing portal URL for a customer
    pub async fn customer_portal(&self, customer_id: Option<&str>) -> Result<String> {
        let customer_id = required(customer_id, "customer")?;
        self.provider
            .create_portal_session(customer_id, &self.config.return_url())
            .await
    }

    /// Subscribe a new customer without a trial, paying immediately
    pub async fn create_no_trial_subscription(
        &self,
        request: NoTrialSubscriptionRequest,
    ) -> Result<IntentOutcome> {
        let email = normalize_email(required(request.email.as_deref(), "email")?);
        let price_id = required(request.price_id.as_deref(), "priceId")?;

        if let Some(customer) = self.first_customer(&email).await? {
            let intents = self.provider.list_payment_intents(&customer.id).await?;
            return Ok(resume_or_exists(customer, &intents));
        }

        let customer = self
            .create_customer(&email, request.name.as_deref(), request.user_id.as_deref())
            .await?;

        let subscription = self
            .provider
            .create_subscription(
                NewSubscription {
                    customer_id: customer.id.clone(),
                    price_id: price_id.to_string(),
                    trial_period_days: None,
                    default_payment_method: None,
                    metadata: user_metadata(request.user_id.as_deref()),
                },
                &subscription_idempotency_key(&customer.id, price_id),
            )
            .await?;

        let client_secret = subscription.client_secret.ok_or_else(|| {
            PaymentError::Stripe(format!(
                "subscription {} returned without a payment intent",
                subscription.id
            ))
        })?;

        Ok(IntentOutcome::Created {
            client_secret,
            customer_id: customer.id,
        })
    }

    /// Start a trial for a customer whose payment method is already saved
    pub async fn create_free_trial_subscription(
        &self,
        request: FreeTrialSubscriptionRequest,
    ) -> Result<Subscription> {
        let customer_id = required(request.customer_id.as_deref(), "customerId")?;
        let price_id = required(request.price_id.as_deref(), "priceId")?;
        let payment_method = required(request.payment_method.as_deref(), "paymentMethod")?;

        let mut metadata = user_metadata(request.user_id.as_deref());
        if let Some(email) = non_blank(request.email.as_deref()) {
            metadata.insert(META_EMAIL.to_string(), email.to_string());
        }

        self.provider
            .create_subscription(
                NewSubscription {
                    customer_id: customer_id.to_string(),
                    price_id: price_id.to_string(),
                    trial_period_days: Some(TRIAL_DAYS),
                    default_payment_method: Some(payment_method.to_string()),
                    metadata,
                },
                &trial_subscription_idempotency_key(customer_id, price_id, payment_method),
            )
            .await
    }

    /// Find-or-create a customer and hand back a setup intent to save a card
    pub async fn create_setup_intent(&self, request: SetupIntentRequest) -> Result<IntentOutcome> {
        let email = normalize_email(required(request.email.as_deref(), "email")?);

        if let Some(customer) = self.first_customer(&email).await? {
            let intents = self.provider.list_setup_intents(&customer.id).await?;
            return Ok(resume_or_exists(customer, &intents));
        }

        let customer = self
            .create_customer(&email, request.name.as_deref(), request.user_id.as_deref())
            .await?;

        let intent = self
            .provider
            .create_setup_intent(
                NewSetupIntent {
                    customer_id: customer.id.clone(),
                    payment_method_types: self.config.payment_method_types.clone(),
                    metadata: user_metadata(request.user_id.as_deref()),
                },
                &setup_intent_idempotency_key(&customer.id),
            )
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentError::Stripe(format!("setup intent {} has no client secret", intent.id))
        })?;

        Ok(IntentOutcome::Created {
            client_secret,
            customer_id: customer.id,
        })
    }

    // Only the first match counts; duplicate records sharing an email are left alone.
    async fn first_customer(&self, email: &str) -> Result<Option<Customer>> {
        let customers = self.provider.find_customers_by_email(email).await?;
        if customers.len() > 1 {
            tracing::debug!(email = %email, count = customers.len(), "Multiple customers share email");
        }
        Ok(customers.into_iter().next())
    }

    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Customer> {
        self.provider
            .create_customer(
                NewCustomer {
                    email: email.to_string(),
                    name: non_blank(name).map(String::from),
                    metadata: user_metadata(user_id),
                },
                &customer_idempotency_key(email),
            )
            .await
    }
}

fn resume_or_exists(customer: Customer, intents: &[Intent]) -> IntentOutcome {
    match intents.iter().find(|intent| intent.is_resumable()) {
        Some(intent) => {
            tracing::info!(customer_id = %customer.id, intent_id = %intent.id, "Resuming pending intent");
            IntentOutcome::Resumed {
                client_secret: intent.client_secret.clone().unwrap_or_default(),
                customer_id: customer.id,
            }
        }
        None => {
            tracing::warn!(customer_id = %customer.id, "Customer already exists");
            IntentOutcome::CustomerExists
        }
    }
}

// Stripe matches `email` searches exactly, so lookups and creates share one spelling.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    non_blank(value).ok_or_else(|| PaymentError::missing(field))
}

fn user_metadata(user_id: Option<&str>) -> HashMap<String, String> {
    non_blank(user_id)
        .map(|id| HashMap::from([(META_USER_ID.to_string(), id.to_string())]))
        .unwrap_or_default()
}

fn hashed_key(prefix: &str, material: &str) -> String {
    let digest = Sha256::digest(material.as_bytes());
    format!("{prefix}-{}", hex::encode(digest))
}

/// Idempotency key for creating the customer behind `email`
pub fn customer_idempotency_key(email: &str) -> String {
    hashed_key("customer", &normalize_email(email))
}

/// Idempotency key for subscribing `customer_id` to `price_id`
pub fn subscription_idempotency_key(customer_id: &str, price_id: &str) -> String {
    hashed_key("subscription", &format!("{customer_id}:{price_id}"))
}

/// Idempotency key for a trial subscription paid with `payment_method_id`
pub fn trial_subscription_idempotency_key(
    customer_id: &str,
    price_id: &str,
    payment_method_id: &str,
) -> String {
    hashed_key(
        "trial-subscription",
        &format!("{customer_id}:{price_id}:{payment_method_id}"),
    )
}

/// Idempotency key for the first setup intent of `customer_id`
pub fn setup_intent_idempotency_key(customer_id: &str) -> String {
    hashed_key("setup-intent", customer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn gateway(mock: &Arc<MockProvider>) -> BillingGateway {
        let config = BillingConfig::new("sk_test_123", "pk_test_123", "whsec_123")
            .with_client_url("https://app.example.com")
            .with_price_lookup_keys(["basic_monthly"]);
        BillingGateway::new(mock.clone(), Arc::new(config))
    }

    fn no_trial(email: &str) -> NoTrialSubscriptionRequest {
        NoTrialSubscriptionRequest {
            name: Some("A".into()),
            email: Some(email.into()),
            user_id: Some("u1".into()),
            price_id: Some("p1".into()),
        }
    }

    #[tokio::test]
    async fn test_no_trial_creates_customer_then_subscription() {
        let mock = Arc::new(MockProvider::new());
        let outcome = gateway(&mock)
            .create_no_trial_subscription(no_trial("a@x.com"))
            .await
            .unwrap();

        let customers = mock.customers();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].email.as_deref(), Some("a@x.com"));

        let subscriptions = mock.subscriptions();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].customer_id, customers[0].id);

        match outcome {
            IntentOutcome::Created { client_secret, customer_id } => {
                assert_eq!(customer_id, customers[0].id);
                assert_eq!(Some(client_secret), subscriptions[0].client_secret);
            }
            other => panic!("expected Created, got {other:?}"),
        }
        assert_eq!(mock.calls("create_customer"), 1);
        assert_eq!(mock.calls("create_subscription"), 1);
    }

    #[tokio::test]
    async fn test_no_trial_existing_customer_is_not_duplicated() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);
        mock.add_customer("a@x.com");

        let outcome = gateway.create_no_trial_subscription(no_trial("a@x.com")).await.unwrap();
        assert_eq!(outcome, IntentOutcome::CustomerExists);

        let outcome = gateway.create_no_trial_subscription(no_trial("a@x.com")).await.unwrap();
        assert_eq!(outcome, IntentOutcome::CustomerExists);

        assert_eq!(mock.calls("create_customer"), 0);
        assert_eq!(mock.calls("create_subscription"), 0);
        assert_eq!(mock.customers().len(), 1);
    }

    #[tokio::test]
    async fn test_no_trial_resumes_pending_payment_intent() {
        let mock = Arc::new(MockProvider::new());
        let customer = mock.add_customer("a@x.com");
        mock.add_payment_intent(&customer.id, "succeeded", "pi_old_secret");
        mock.add_payment_intent(&customer.id, "requires_payment_method", "pi_pending_secret");

        let outcome = gateway(&mock)
            .create_no_trial_subscription(no_trial("a@x.com"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IntentOutcome::Resumed {
                client_secret: "pi_pending_secret".into(),
                customer_id: customer.id,
            }
        );
        assert_eq!(mock.calls("create_subscription"), 0);
    }

    #[tokio::test]
    async fn test_only_first_matching_customer_is_considered() {
        let mock = Arc::new(MockProvider::new());
        mock.add_customer("a@x.com");
        let second = mock.add_customer("a@x.com");
        mock.add_payment_intent(&second.id, "requires_payment_method", "pi_second");

        let outcome = gateway(&mock)
            .create_no_trial_subscription(no_trial("a@x.com"))
            .await
            .unwrap();

        assert_eq!(outcome, IntentOutcome::CustomerExists);
    }

    #[tokio::test]
    async fn test_no_trial_requires_email_and_price() {
        let mock = Arc::new(MockProvider::new());
        let mut request = no_trial("a@x.com");
        request.price_id = None;

        let err = gateway(&mock).create_no_trial_subscription(request).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_checkout_requires_price_and_user() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);

        let missing_price = CheckoutRequest {
            price: None,
            email: Some("a@x.com".into()),
            user_id: Some("u1".into()),
        };
        let missing_user = CheckoutRequest {
            price: Some("price_1".into()),
            email: Some("a@x.com".into()),
            user_id: Some("   ".into()),
        };

        for request in [missing_price, missing_user] {
            let err = gateway.create_checkout_session(request).await.unwrap_err();
            assert!(matches!(err, PaymentError::Validation(_)));
        }
        assert_eq!(mock.calls("create_checkout_session"), 0);
    }

    #[tokio::test]
    async fn test_checkout_session_carries_trial_and_metadata() {
        let mock = Arc::new(MockProvider::new());
        let before = Utc::now().timestamp();

        let url = gateway(&mock)
            .create_checkout_session(CheckoutRequest {
                price: Some("price_1".into()),
                email: Some("a@x.com".into()),
                user_id: Some("u1".into()),
            })
            .await
            .unwrap();
        assert!(url.starts_with("https://checkout.stripe.test/c/pay/cs_"));

        let params = mock.last_checkout_params().unwrap();
        assert_eq!(params.price_id, "price_1");
        assert_eq!(params.client_reference_id.as_deref(), Some("u1"));
        assert_eq!(params.metadata.get(META_USER_ID).map(String::as_str), Some("u1"));
        assert_eq!(params.metadata.get(META_EMAIL).map(String::as_str), Some("a@x.com"));
        assert_eq!(params.cancel_url, "https://app.example.com/");

        let two_weeks = i64::from(TRIAL_DAYS) * 24 * 60 * 60;
        let trial_end = params.trial_end.unwrap();
        assert!(trial_end >= before + two_weeks && trial_end <= Utc::now().timestamp() + two_weeks);
    }

    #[tokio::test]
    async fn test_free_trial_uses_payment_method_without_search() {
        let mock = Arc::new(MockProvider::new());
        let subscription = gateway(&mock)
            .create_free_trial_subscription(FreeTrialSubscriptionRequest {
                user_id: Some("u1".into()),
                email: Some("a@x.com".into()),
                customer_id: Some("cus_existing".into()),
                payment_method: Some("pm_card".into()),
                price_id: Some("p1".into()),
            })
            .await
            .unwrap();

        assert_eq!(subscription.customer_id, "cus_existing");
        assert_eq!(subscription.status, "trialing");
        assert_eq!(mock.calls("find_customers_by_email"), 0);

        let params = mock.last_subscription_params().unwrap();
        assert_eq!(params.trial_period_days, Some(TRIAL_DAYS));
        assert_eq!(params.default_payment_method.as_deref(), Some("pm_card"));
    }

    #[tokio::test]
    async fn test_free_trial_after_no_trial_starts_a_new_trial() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);

        let IntentOutcome::Created { customer_id, .. } = gateway
            .create_no_trial_subscription(no_trial("a@x.com"))
            .await
            .unwrap()
        else {
            panic!("expected a new customer");
        };

        let subscription = gateway
            .create_free_trial_subscription(FreeTrialSubscriptionRequest {
                user_id: Some("u1".into()),
                email: Some("a@x.com".into()),
                customer_id: Some(customer_id.clone()),
                payment_method: Some("pm_new".into()),
                price_id: Some("p1".into()),
            })
            .await
            .unwrap();

        assert_eq!(subscription.status, "trialing");
        assert_eq!(subscription.customer_id, customer_id);
        assert_eq!(mock.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_no_trial_requests_share_one_customer() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);
        // Both requests search before either has created anything.
        mock.hide_customers_from_searches(2);

        let (first, second) = tokio::join!(
            gateway.create_no_trial_subscription(no_trial("a@x.com")),
            gateway.create_no_trial_subscription(no_trial("a@x.com")),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert!(matches!(first, IntentOutcome::Created { .. }));
        assert_eq!(first, second);
        assert_eq!(mock.calls("create_customer"), 2);
        assert_eq!(mock.customers().len(), 1);
        assert_eq!(mock.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_setup_intents_share_one_customer() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);
        mock.hide_customers_from_searches(2);
        let request = SetupIntentRequest {
            name: Some("A".into()),
            email: Some("a@x.com".into()),
            user_id: Some("u1".into()),
        };

        let (first, second) = tokio::join!(
            gateway.create_setup_intent(request.clone()),
            gateway.create_setup_intent(request),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert!(matches!(first, IntentOutcome::Created { .. }));
        assert_eq!(first, second);
        assert_eq!(mock.customers().len(), 1);
        let customer_id = &mock.customers()[0].id;
        assert_eq!(mock.setup_intents(customer_id).len(), 1);
    }

    #[tokio::test]
    async fn test_email_case_does_not_split_customers() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);

        let created = gateway
            .create_no_trial_subscription(no_trial("A@X.com "))
            .await
            .unwrap();
        assert!(matches!(created, IntentOutcome::Created { .. }));
        assert_eq!(mock.customers()[0].email.as_deref(), Some("a@x.com"));

        // The first subscription's payment intent is not in the customer's list yet.
        let again = gateway.create_no_trial_subscription(no_trial("a@x.com")).await.unwrap();
        assert_eq!(again, IntentOutcome::CustomerExists);
        assert_eq!(mock.calls("create_customer"), 1);
        assert_eq!(mock.customers().len(), 1);
    }

    #[tokio::test]
    async fn test_setup_intent_mirrors_find_or_create() {
        let mock = Arc::new(MockProvider::new());
        let gateway = gateway(&mock);
        let request = SetupIntentRequest {
            name: Some("A".into()),
            email: Some("a@x.com".into()),
            user_id: Some("u1".into()),
        };

        let created = gateway.create_setup_intent(request.clone()).await.unwrap();
        let IntentOutcome::Created { customer_id, .. } = created.clone() else {
            panic!("expected Created, got {created:?}");
        };
        assert_eq!(mock.calls("create_setup_intent"), 1);

        // The new intent still waits for a payment method, so it is resumed.
        let resumed = gateway.create_setup_intent(request.clone()).await.unwrap();
        assert!(matches!(resumed, IntentOutcome::Resumed { customer_id: ref id, .. } if *id == customer_id));

        mock.complete_setup_intents(&customer_id);
        let exists = gateway.create_setup_intent(request).await.unwrap();
        assert_eq!(exists, IntentOutcome::CustomerExists);
        assert_eq!(mock.calls("create_customer"), 1);
        assert_eq!(mock.calls("create_setup_intent"), 1);
    }

    #[tokio::test]
    async fn test_empty_price_list_is_ok() {
        let mock = Arc::new(MockProvider::new());
        let prices = gateway(&mock).load_prices().await.unwrap();
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let mock = Arc::new(MockProvider::new());
        mock.fail_with("rate limited");

        let err = gateway(&mock)
            .create_no_trial_subscription(no_trial("a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Stripe(msg) if msg.contains("rate limited")));
    }

    #[test]
    fn test_idempotency_keys_are_stable() {
        assert_eq!(
            customer_idempotency_key("A@X.com "),
            customer_idempotency_key("a@x.com")
        );
        assert_ne!(
            customer_idempotency_key("a@x.com"),
            customer_idempotency_key("b@x.com")
        );
        assert!(subscription_idempotency_key("cus_1", "p1").starts_with("subscription-"));
        assert_ne!(
            subscription_idempotency_key("cus_1", "p1"),
            subscription_idempotency_key("cus_1", "p2")
        );
        assert_ne!(
            trial_subscription_idempotency_key("cus_1", "p1", "pm_1"),
            subscription_idempotency_key("cus_1", "p1")
        );
        assert_ne!(
            trial_subscription_idempotency_key("cus_1", "p1", "pm_1"),
            trial_subscription_idempotency_key("cus_1", "p1", "pm_2")
        );
    }
}
