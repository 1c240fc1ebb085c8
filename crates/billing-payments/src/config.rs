//! Billing Configuration
//!
//! Everything the gateway and webhook dispatcher need, loaded once at startup.

use crate::error::{PaymentError, Result};

/// Default webhook timestamp tolerance, matching Stripe's own libraries.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe and client-facing settings
#[derive(Clone, Debug)]
pub struct BillingConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: String,

    /// Publishable key handed to the front-end (`pk_...`)
    pub publishable_key: String,

    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: String,

    /// Maximum age of a webhook signature timestamp
    pub webhook_tolerance_secs: i64,

    /// Base URL of the front-end, without trailing slash
    pub client_url: String,

    /// Lookup keys of the prices offered on the pricing page
    pub price_lookup_keys: Vec<String>,

    /// Payment method types allowed on setup intents
    pub payment_method_types: Vec<String>,
}

impl BillingConfig {
    pub fn new(
        secret_key: impl Into<String>,
        publishable_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
            webhook_secret: webhook_secret.into(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            client_url: "http://localhost:3000".into(),
            price_lookup_keys: Vec::new(),
            payment_method_types: vec!["card".into()],
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{key} not set")))
        };

        let mut config = Self::new(
            required("STRIPE_SECRET_KEY")?,
            required("STRIPE_PUBLISHABLE_KEY")?,
            required("STRIPE_WEBHOOK_SECRET")?,
        );

        if let Some(url) = lookup("CLIENT_URL") {
            config = config.with_client_url(&url);
        }
        if let Some(keys) = lookup("PRICE_LOOKUP_KEYS") {
            config.price_lookup_keys = split_list(&keys);
        }
        if let Some(types) = lookup("PAYMENT_METHOD_TYPES") {
            let types = split_list(&types);
            if !types.is_empty() {
                config.payment_method_types = types;
            }
        }
        if let Some(tolerance) = lookup("WEBHOOK_TOLERANCE_SECS") {
            config.webhook_tolerance_secs = tolerance.trim().parse().map_err(|_| {
                PaymentError::Config(format!("WEBHOOK_TOLERANCE_SECS is not a number: {tolerance}"))
            })?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_client_url(mut self, url: &str) -> Self {
        self.client_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_price_lookup_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.price_lookup_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Where Stripe Checkout sends the customer after paying
    pub fn success_url(&self) -> String {
        format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.client_url)
    }

    /// Cancel and portal return URL
    pub fn return_url(&self) -> String {
        format!("{}/", self.client_url)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
