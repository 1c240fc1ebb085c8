//! Stripe-backed [`BillingProvider`]

use std::str::FromStr;

use stripe::{
    BillingPortalSession, CheckoutSession as StripeCheckoutSession, CheckoutSessionId,
    CheckoutSessionMode, Client, CreateBillingPortalSession, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionSubscriptionData, CreateCustomer,
    CreateSetupIntent, CreateSubscription, CreateSubscriptionItems,
    Customer as StripeCustomer, CustomerId, CustomerInvoiceSettings, ListCustomers,
    ListPaymentIntents, ListPrices, ListSetupIntents, PaymentIntent, PaymentIntentId,
    Price as StripePrice, RequestStrategy, SetupIntent, Subscription as StripeSubscription,
    SubscriptionId, SubscriptionPaymentBehavior, UpdateCustomer, UpdateSubscription,
};

use crate::error::{PaymentError, Result};
use crate::provider::{
    BillingProvider, CheckoutSession, Customer, Intent, NewCheckoutSession, NewCustomer,
    NewSetupIntent, NewSubscription, Price, Subscription,
};

/// Stripe client wrapper
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// A client whose create requests carry `Idempotency-Key: key`
    fn idempotent(&self, key: &str) -> Client {
        self.client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(key.to_string()))
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient").finish_non_exhaustive()
    }
}

fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| PaymentError::Validation(format!("invalid {kind} id: {raw}")))
}

fn to_customer(customer: StripeCustomer) -> Customer {
    Customer {
        id: customer.id.to_string(),
        email: customer.email,
        name: customer.name,
    }
}

fn to_subscription(sub: StripeSubscription) -> Subscription {
    let client_secret = sub
        .latest_invoice
        .and_then(|invoice| invoice.into_object())
        .and_then(|invoice| invoice.payment_intent)
        .and_then(|intent| intent.into_object())
        .and_then(|intent| intent.client_secret);

    Subscription {
        id: sub.id.to_string(),
        customer_id: sub.customer.id().to_string(),
        status: sub.status.as_str().to_string(),
        trial_end: sub.trial_end,
        client_secret,
    }
}

fn to_price(price: StripePrice) -> Price {
    Price {
        id: price.id.to_string(),
        lookup_key: price.lookup_key,
        unit_amount: price.unit_amount,
        currency: price.currency.map(|c| c.to_string()),
        interval: price.recurring.map(|r| r.interval.as_str().to_string()),
        product: price.product.map(|p| p.id().to_string()),
    }
}

#[async_trait::async_trait]
impl BillingProvider for StripeClient {
    async fn find_customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        let mut params = ListCustomers::new();
        params.email = Some(email);

        let customers = StripeCustomer::list(&self.client, &params).await?;
        Ok(customers.data.into_iter().map(to_customer).collect())
    }

    async fn create_customer(&self, params: NewCustomer, idempotency_key: &str) -> Result<Customer> {
        let client = self.idempotent(idempotency_key);

        let mut create = CreateCustomer::new();
        create.email = Some(&params.email);
        create.name = params.name.as_deref();
        create.metadata = Some(params.metadata.clone());

        let customer = StripeCustomer::create(&client, create).await?;
        tracing::info!(customer_id = %customer.id, "Created Stripe customer");
        Ok(to_customer(customer))
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer> {
        let id: CustomerId = parse_id(customer_id, "customer")?;
        let customer = StripeCustomer::retrieve(&self.client, &id, &[]).await?;
        Ok(to_customer(customer))
    }

    async fn list_payment_intents(&self, customer_id: &str) -> Result<Vec<Intent>> {
        let mut params = ListPaymentIntents::new();
        params.customer = Some(parse_id(customer_id, "customer")?);

        let intents = PaymentIntent::list(&self.client, &params).await?;
        Ok(intents
            .data
            .into_iter()
            .map(|pi| Intent {
                id: pi.id.to_string(),
                status: pi.status.as_str().to_string(),
                client_secret: pi.client_secret,
            })
            .collect())
    }

    async fn list_setup_intents(&self, customer_id: &str) -> Result<Vec<Intent>> {
        let mut params = ListSetupIntents::new();
        params.customer = Some(parse_id(customer_id, "customer")?);

        let intents = SetupIntent::list(&self.client, &params).await?;
        Ok(intents
            .data
            .into_iter()
            .map(|si| Intent {
                id: si.id.to_string(),
                status: si.status.as_str().to_string(),
                client_secret: si.client_secret,
            })
            .collect())
    }

    async fn create_setup_intent(
        &self,
        params: NewSetupIntent,
        idempotency_key: &str,
    ) -> Result<Intent> {
        let client = self.idempotent(idempotency_key);

        let mut create = CreateSetupIntent::new();
        create.customer = Some(parse_id(&params.customer_id, "customer")?);
        create.payment_method_types = Some(params.payment_method_types.clone());
        create.metadata = Some(params.metadata.clone());

        let intent = SetupIntent::create(&client, create).await?;
        tracing::info!(setup_intent_id = %intent.id, customer_id = %params.customer_id, "Created setup intent");
        Ok(Intent {
            id: intent.id.to_string(),
            status: intent.status.as_str().to_string(),
            client_secret: intent.client_secret,
        })
    }

    async fn create_subscription(
        &self,
        params: NewSubscription,
        idempotency_key: &str,
    ) -> Result<Subscription> {
        let client = self.idempotent(idempotency_key);

        let mut create = CreateSubscription::new(parse_id(&params.customer_id, "customer")?);
        create.items = Some(vec![CreateSubscriptionItems {
            price: Some(params.price_id.clone()),
            ..Default::default()
        }]);
        create.metadata = Some(params.metadata.clone());
        create.default_payment_method = params.default_payment_method.as_deref();
        create.expand = &["latest_invoice.payment_intent"];

        match params.trial_period_days {
            Some(days) => create.trial_period_days = Some(days),
            None => {
                create.payment_behavior = Some(SubscriptionPaymentBehavior::DefaultIncomplete);
            }
        }

        let subscription = StripeSubscription::create(&client, create).await?;
        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %params.customer_id,
            trial = params.trial_period_days.is_some(),
            "Created Stripe subscription"
        );
        Ok(to_subscription(subscription))
    }

    async fn create_checkout_session(&self, params: NewCheckoutSession) -> Result<CheckoutSession> {
        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Subscription);
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.customer_email = params.customer_email.as_deref();
        create.client_reference_id = params.client_reference_id.as_deref();
        create.metadata = Some(params.metadata.clone());
        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        create.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            trial_end: params.trial_end,
            metadata: Some(params.metadata.clone()),
            ..Default::default()
        });

        let session = StripeCheckoutSession::create(&self.client, create).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
            customer_id: session.customer.map(|c| c.id().to_string()),
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let id: CheckoutSessionId = parse_id(session_id, "checkout session")?;
        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[]).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
            customer_id: session.customer.map(|c| c.id().to_string()),
        })
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let mut create = CreateBillingPortalSession::new(parse_id(customer_id, "customer")?);
        create.return_url = Some(return_url);

        let session = BillingPortalSession::create(&self.client, create).await?;
        Ok(session.url)
    }

    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>> {
        let mut params = ListPrices::new();
        params.active = Some(true);
        if !lookup_keys.is_empty() {
            params.lookup_keys = Some(lookup_keys.to_vec());
        }

        let prices = StripePrice::list(&self.client, &params).await?;
        Ok(prices.data.into_iter().map(to_price).collect())
    }

    async fn set_customer_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let id: CustomerId = parse_id(customer_id, "customer")?;

        let mut params = UpdateCustomer::new();
        params.invoice_settings = Some(CustomerInvoiceSettings {
            default_payment_method: Some(payment_method_id.to_string()),
            ..Default::default()
        });

        StripeCustomer::update(&self.client, &id, params).await?;
        Ok(())
    }

    async fn payment_intent_payment_method(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<String>> {
        let id: PaymentIntentId = parse_id(payment_intent_id, "payment intent")?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &[]).await?;
        Ok(intent.payment_method.map(|pm| pm.id().to_string()))
    }

    async fn set_subscription_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let id: SubscriptionId = parse_id(subscription_id, "subscription")?;

        let mut params = UpdateSubscription::new();
        params.default_payment_method = Some(payment_method_id);

        StripeSubscription::update(&self.client, &id, params).await?;
        Ok(())
    }
}
