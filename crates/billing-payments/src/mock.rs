//! In-memory [`BillingProvider`] for tests
//!
//! Records every call, honors idempotency keys the way Stripe does (a repeated
//! key returns the original object), and can be switched into a failing mode.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{PaymentError, Result};
use crate::provider::{
    BillingProvider, CheckoutSession, Customer, Intent, NewCheckoutSession, NewCustomer,
    NewSetupIntent, NewSubscription, Price, REQUIRES_PAYMENT_METHOD, Subscription,
};

#[derive(Default)]
struct MockState {
    next_id: u32,
    calls: Vec<&'static str>,
    failure: Option<String>,
    hidden_searches: usize,
    customers: Vec<Customer>,
    payment_intents: HashMap<String, Vec<Intent>>,
    setup_intents: HashMap<String, Vec<Intent>>,
    subscriptions: Vec<Subscription>,
    sessions: Vec<CheckoutSession>,
    prices: Vec<Price>,
    idempotent: HashMap<String, String>,
    payment_intent_methods: HashMap<String, String>,
    customer_default_pm: HashMap<String, String>,
    subscription_default_pm: HashMap<String, String>,
    last_checkout: Option<NewCheckoutSession>,
    last_subscription: Option<NewSubscription>,
}

impl MockState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_mock{}", self.next_id)
    }
}

/// Stripe stand-in backed by plain collections
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test must not poison the others sharing the mock.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record a call and fail it if a failure is armed
    fn enter(&self, call: &'static str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(message) = state.failure.clone() {
            return Err(PaymentError::Stripe(message));
        }
        Ok(state)
    }

    /// Make every subsequent provider call fail with `message`
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    /// Make the next `count` email searches come back empty, as if they raced
    /// ahead of a concurrent create
    pub fn hide_customers_from_searches(&self, count: usize) {
        self.lock().hidden_searches = count;
    }

    /// Number of calls made to `method`
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn add_customer(&self, email: &str) -> Customer {
        let mut state = self.lock();
        let customer = Customer {
            id: state.id("cus"),
            email: Some(email.to_string()),
            name: None,
        };
        state.customers.push(customer.clone());
        customer
    }

    pub fn add_payment_intent(&self, customer_id: &str, status: &str, client_secret: &str) -> Intent {
        let mut state = self.lock();
        let intent = Intent {
            id: state.id("pi"),
            status: status.to_string(),
            client_secret: Some(client_secret.to_string()),
        };
        state
            .payment_intents
            .entry(customer_id.to_string())
            .or_default()
            .push(intent.clone());
        intent
    }

    /// Attach `payment_method_id` to an existing payment intent
    pub fn set_payment_intent_method(&self, payment_intent_id: &str, payment_method_id: &str) {
        self.lock()
            .payment_intent_methods
            .insert(payment_intent_id.to_string(), payment_method_id.to_string());
    }

    pub fn add_price(&self, lookup_key: &str, unit_amount: i64) -> Price {
        let mut state = self.lock();
        let price = Price {
            id: state.id("price"),
            lookup_key: Some(lookup_key.to_string()),
            unit_amount: Some(unit_amount),
            currency: Some("usd".into()),
            interval: Some("month".into()),
            product: None,
        };
        state.prices.push(price.clone());
        price
    }

    /// Register a completed checkout session that belongs to `customer_id`
    pub fn add_checkout_session(&self, customer_id: &str) -> CheckoutSession {
        let mut state = self.lock();
        let session = CheckoutSession {
            id: state.id("cs"),
            url: None,
            customer_id: Some(customer_id.to_string()),
        };
        state.sessions.push(session.clone());
        session
    }

    /// Mark every setup intent of the customer as succeeded
    pub fn complete_setup_intents(&self, customer_id: &str) {
        if let Some(intents) = self.lock().setup_intents.get_mut(customer_id) {
            for intent in intents {
                intent.status = "succeeded".into();
            }
        }
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.lock().subscriptions.clone()
    }

    pub fn setup_intents(&self, customer_id: &str) -> Vec<Intent> {
        self.lock().setup_intents.get(customer_id).cloned().unwrap_or_default()
    }

    pub fn last_checkout_params(&self) -> Option<NewCheckoutSession> {
        self.lock().last_checkout.clone()
    }

    pub fn last_subscription_params(&self) -> Option<NewSubscription> {
        self.lock().last_subscription.clone()
    }

    pub fn customer_default_payment_method(&self, customer_id: &str) -> Option<String> {
        self.lock().customer_default_pm.get(customer_id).cloned()
    }

    pub fn subscription_default_payment_method(&self, subscription_id: &str) -> Option<String> {
        self.lock().subscription_default_pm.get(subscription_id).cloned()
    }
}

#[async_trait]
impl BillingProvider for MockProvider {
    async fn find_customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        let mut state = self.enter("find_customers_by_email")?;
        if state.hidden_searches > 0 {
            state.hidden_searches -= 1;
            return Ok(Vec::new());
        }
        Ok(state
            .customers
            .iter()
            .filter(|c| c.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn create_customer(&self, params: NewCustomer, idempotency_key: &str) -> Result<Customer> {
        let mut state = self.enter("create_customer")?;
        if let Some(id) = state.idempotent.get(idempotency_key).cloned() {
            if let Some(existing) = state.customers.iter().find(|c| c.id == id) {
                return Ok(existing.clone());
            }
        }

        let customer = Customer {
            id: state.id("cus"),
            email: Some(params.email),
            name: params.name,
        };
        state.idempotent.insert(idempotency_key.to_string(), customer.id.clone());
        state.customers.push(customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer> {
        let state = self.enter("retrieve_customer")?;
        state
            .customers
            .iter()
            .find(|c| c.id == customer_id)
            .cloned()
            .ok_or_else(|| PaymentError::Stripe(format!("No such customer: '{customer_id}'")))
    }

    async fn list_payment_intents(&self, customer_id: &str) -> Result<Vec<Intent>> {
        let state = self.enter("list_payment_intents")?;
        Ok(state.payment_intents.get(customer_id).cloned().unwrap_or_default())
    }

    async fn list_setup_intents(&self, customer_id: &str) -> Result<Vec<Intent>> {
        let state = self.enter("list_setup_intents")?;
        Ok(state.setup_intents.get(customer_id).cloned().unwrap_or_default())
    }

    async fn create_setup_intent(
        &self,
        params: NewSetupIntent,
        idempotency_key: &str,
    ) -> Result<Intent> {
        let mut state = self.enter("create_setup_intent")?;
        if let Some(id) = state.idempotent.get(idempotency_key).cloned() {
            let existing = state
                .setup_intents
                .get(&params.customer_id)
                .and_then(|intents| intents.iter().find(|i| i.id == id));
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        let id = state.id("seti");
        let intent = Intent {
            client_secret: Some(format!("{id}_secret")),
            id,
            status: REQUIRES_PAYMENT_METHOD.into(),
        };
        state.idempotent.insert(idempotency_key.to_string(), intent.id.clone());
        state
            .setup_intents
            .entry(params.customer_id)
            .or_default()
            .push(intent.clone());
        Ok(intent)
    }

    async fn create_subscription(
        &self,
        params: NewSubscription,
        idempotency_key: &str,
    ) -> Result<Subscription> {
        let mut state = self.enter("create_subscription")?;
        state.last_subscription = Some(params.clone());
        if let Some(id) = state.idempotent.get(idempotency_key).cloned() {
            if let Some(existing) = state.subscriptions.iter().find(|s| s.id == id) {
                return Ok(existing.clone());
            }
        }

        let id = state.id("sub");
        let (status, client_secret) = match params.trial_period_days {
            Some(_) => ("trialing", None),
            None => ("incomplete", Some(format!("pi_for_{id}_secret"))),
        };
        let subscription = Subscription {
            id,
            customer_id: params.customer_id,
            status: status.into(),
            trial_end: None,
            client_secret,
        };
        state
            .idempotent
            .insert(idempotency_key.to_string(), subscription.id.clone());
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn create_checkout_session(&self, params: NewCheckoutSession) -> Result<CheckoutSession> {
        let mut state = self.enter("create_checkout_session")?;
        let id = state.id("cs");
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/c/pay/{id}")),
            id,
            customer_id: None,
        };
        state.last_checkout = Some(params);
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let state = self.enter("retrieve_checkout_session")?;
        state
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| PaymentError::Stripe(format!("No such checkout.session: '{session_id}'")))
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<String> {
        let _state = self.enter("create_portal_session")?;
        Ok(format!("https://billing.stripe.test/p/session/{customer_id}"))
    }

    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>> {
        let state = self.enter("list_prices")?;
        Ok(state
            .prices
            .iter()
            .filter(|p| {
                lookup_keys.is_empty()
                    || p.lookup_key.as_ref().is_some_and(|key| lookup_keys.contains(key))
            })
            .cloned()
            .collect())
    }

    async fn set_customer_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("set_customer_default_payment_method")?;
        state
            .customer_default_pm
            .insert(customer_id.to_string(), payment_method_id.to_string());
        Ok(())
    }

    async fn payment_intent_payment_method(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<String>> {
        let state = self.enter("payment_intent_payment_method")?;
        Ok(state.payment_intent_methods.get(payment_intent_id).cloned())
    }

    async fn set_subscription_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("set_subscription_default_payment_method")?;
        state
            .subscription_default_pm
            .insert(subscription_id.to_string(), payment_method_id.to_string());
        Ok(())
    }
}
