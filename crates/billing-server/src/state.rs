//! Application State

use std::sync::Arc;

use billing_payments::{
    BillingConfig, BillingGateway, BillingProvider, ProviderEventHandlers, WebhookDispatcher,
    WebhookVerifier,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout, subscription and portal operations
    pub gateway: BillingGateway,

    /// Signed webhook ingestion
    pub webhooks: WebhookDispatcher,
}

impl AppState {
    /// Wire gateway and webhook dispatcher around one provider handle
    pub fn new(provider: Arc<dyn BillingProvider>, config: BillingConfig) -> Self {
        let verifier = WebhookVerifier::from_config(&config);
        let handlers = Arc::new(ProviderEventHandlers::new(provider.clone()));

        Self {
            gateway: BillingGateway::new(provider, Arc::new(config)),
            webhooks: WebhookDispatcher::new(verifier, handlers),
        }
    }
}
