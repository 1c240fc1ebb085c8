//! Stripe Webhook Handling
//!
//! Verifies the `Stripe-Signature` header, decodes the event envelope and
//! routes it to the matching [`EventHandlers`] method. Nothing is persisted:
//! Stripe is the system of record and redelivers on any non-2xx response.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::BillingConfig;
use crate::error::{PaymentError, Result};
use crate::provider::BillingProvider;

type HmacSha256 = Hmac<Sha256>;

/// Events that run a handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandledEvent {
    SetupIntentSucceeded,
    InvoicePaymentSucceeded,
    CustomerSubscriptionCreated,
}

impl HandledEvent {
    pub const ALL: [Self; 3] = [
        Self::SetupIntentSucceeded,
        Self::InvoicePaymentSucceeded,
        Self::CustomerSubscriptionCreated,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Self::SetupIntentSucceeded => "setup_intent.succeeded",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.tag() == tag)
    }
}

/// Events we expect from Stripe but only log
pub const LOGGED_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "customer.created",
    "customer.updated",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "customer.subscription.trial_will_end",
    "invoice.finalized",
    "invoice.paid",
    "invoice.payment_failed",
    "payment_intent.created",
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_method.attached",
    "setup_intent.created",
];

/// What the dispatcher did with an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Handled(HandledEvent),
    Logged(String),
    Unhandled(String),
}

/// Verified event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// `data.object` of a `setup_intent.*` event
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SetupIntentObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// `data.object` of an `invoice.*` event
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub billing_reason: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// `data.object` of a `customer.subscription.*` event
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub trial_end: Option<i64>,
}

/// Side effects for each [`HandledEvent`]
#[async_trait]
pub trait EventHandlers: Send + Sync {
    async fn setup_intent_succeeded(&self, intent: SetupIntentObject) -> Result<()>;

    async fn invoice_payment_succeeded(&self, invoice: InvoiceObject) -> Result<()>;

    async fn subscription_created(&self, subscription: SubscriptionObject) -> Result<()>;
}

/// Checks `Stripe-Signature` headers against the signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(config.webhook_secret.clone(), config.webhook_tolerance_secs)
    }

    /// Verify signature and parse event
    pub fn construct_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        self.verify_at(payload, signature, Utc::now().timestamp())?;
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Verify a `t=<unix>,v1=<hex>[,v1=<hex>...]` header as of `now`
    pub fn verify_at(&self, payload: &[u8], signature: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(PaymentError::WebhookSignature("no v1 signature".into()));
        }
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| PaymentError::WebhookSignature("invalid timestamp".into()))?;

        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate).is_ok_and(|expected| {
                self.mac(timestamp, payload)
                    .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
            })
        });
        if !matched {
            return Err(PaymentError::WebhookSignature(
                "no signature matches the expected signature for payload".into(),
            ));
        }

        // Only stale deliveries are refused; a sender clock running ahead is tolerated.
        if now - ts > self.tolerance_secs {
            return Err(PaymentError::WebhookSignature(format!(
                "timestamp outside the tolerance zone ({ts})"
            )));
        }

        Ok(())
    }

    /// Build a header value the way Stripe signs deliveries
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let mac = self.mac(&timestamp.to_string(), payload)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Verify-then-dispatch entry point for the webhook route
#[derive(Clone)]
pub struct WebhookDispatcher {
    verifier: WebhookVerifier,
    handlers: Arc<dyn EventHandlers>,
}

impl WebhookDispatcher {
    pub fn new(verifier: WebhookVerifier, handlers: Arc<dyn EventHandlers>) -> Self {
        Self { verifier, handlers }
    }

    /// Verify the delivery and run at most one handler.
    ///
    /// Signature failures return before any handler is looked up; handler
    /// failures are returned so that Stripe retries the delivery.
    pub async fn process(&self, payload: &[u8], signature: Option<&str>) -> Result<Dispatch> {
        let signature = signature
            .ok_or_else(|| PaymentError::WebhookSignature("missing stripe-signature header".into()))?;
        let event = self.verifier.construct_event(payload, signature)?;

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        let Some(handled) = HandledEvent::from_tag(&event.event_type) else {
            if LOGGED_EVENTS.contains(&event.event_type.as_str()) {
                tracing::debug!(event_type = %event.event_type, "Webhook event logged only");
                return Ok(Dispatch::Logged(event.event_type));
            }
            tracing::warn!(event_type = %event.event_type, "Unhandled webhook event type");
            return Ok(Dispatch::Unhandled(event.event_type));
        };

        let object = event.data.object;
        match handled {
            HandledEvent::SetupIntentSucceeded => {
                self.handlers.setup_intent_succeeded(decode(object)?).await?;
            }
            HandledEvent::InvoicePaymentSucceeded => {
                self.handlers.invoice_payment_succeeded(decode(object)?).await?;
            }
            HandledEvent::CustomerSubscriptionCreated => {
                self.handlers.subscription_created(decode(object)?).await?;
            }
        }

        Ok(Dispatch::Handled(handled))
    }
}

fn decode<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object).map_err(|e| PaymentError::WebhookParse(e.to_string()))
}

/// Handlers that reconcile payment methods through the provider
pub struct ProviderEventHandlers {
    provider: Arc<dyn BillingProvider>,
}

impl ProviderEventHandlers {
    pub fn new(provider: Arc<dyn BillingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl EventHandlers for ProviderEventHandlers {
    /// Make the freshly saved card the customer's default for invoices
    async fn setup_intent_succeeded(&self, intent: SetupIntentObject) -> Result<()> {
        let (Some(customer), Some(payment_method)) = (intent.customer, intent.payment_method) else {
            tracing::warn!(setup_intent_id = %intent.id, "Setup intent without customer or payment method");
            return Ok(());
        };

        self.provider
            .set_customer_default_payment_method(&customer, &payment_method)
            .await?;
        tracing::info!(
            setup_intent_id = %intent.id,
            customer_id = %customer,
            payment_method = %payment_method,
            "Saved default payment method"
        );
        Ok(())
    }

    /// After the first invoice is paid, keep its card on the subscription
    async fn invoice_payment_succeeded(&self, invoice: InvoiceObject) -> Result<()> {
        if invoice.billing_reason.as_deref() != Some("subscription_create") {
            tracing::info!(invoice_id = %invoice.id, reason = ?invoice.billing_reason, "Invoice paid");
            return Ok(());
        }
        let (Some(subscription), Some(payment_intent)) = (invoice.subscription, invoice.payment_intent)
        else {
            tracing::info!(invoice_id = %invoice.id, "Invoice paid without subscription payment intent");
            return Ok(());
        };

        let Some(payment_method) = self.provider.payment_intent_payment_method(&payment_intent).await?
        else {
            tracing::warn!(payment_intent_id = %payment_intent, "Paid intent has no payment method");
            return Ok(());
        };

        self.provider
            .set_subscription_default_payment_method(&subscription, &payment_method)
            .await?;
        tracing::info!(
            invoice_id = %invoice.id,
            subscription_id = %subscription,
            payment_method = %payment_method,
            "Subscription marked paid"
        );
        Ok(())
    }

    async fn subscription_created(&self, subscription: SubscriptionObject) -> Result<()> {
        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = ?subscription.customer,
            status = ?subscription.status,
            trial_end = ?subscription.trial_end,
            "Subscription created"
        );
        Ok(())
    }
}
