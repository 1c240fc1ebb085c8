//! billing-gateway HTTP Server
//!
//! Axum-based server proxying checkout, subscription and webhook traffic
//! to Stripe, and serving the pre-built front-end from `STATIC_DIR`.

mod error;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billing_payments::{BillingConfig, StripeClient};

use crate::handlers::{
    checkout_subscription_success, create_checkout_session, create_free_trial_subscription,
    create_no_trial_subscription, customer_portal, health_check, load_prices, load_stripe,
    setup_intent, stripe_webhook,
};
use crate::state::AppState;

/// Build the router; unmatched GETs fall through to the static front-end.
pub fn app(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Checkout (hosted)
        .route("/load-stripe", get(load_stripe))
        .route("/load-prices", get(load_prices))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/checkout-subscription-success", post(checkout_subscription_success))
        .route("/customer-portal", post(customer_portal))
        // Elements (embedded)
        .route("/create-no-trial-subscription", post(create_no_trial_subscription))
        .route("/create-free-trial-subscription", post(create_free_trial_subscription))
        .route("/setup-intent", post(setup_intent))
        // Stripe → us
        .route("/webhook", post(stripe_webhook))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BillingConfig::from_env()?;
    if config.price_lookup_keys.is_empty() {
        tracing::warn!("PRICE_LOOKUP_KEYS not set - /load-prices returns every active price");
    }

    let provider = Arc::new(StripeClient::new(&config.secret_key));
    let state = AppState::new(provider, config);

    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into());
    let router = app(state, &static_dir);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, static_dir = %static_dir, "billing-server listening");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /load-stripe                    - Publishable key");
    tracing::info!("  GET  /load-prices                    - Prices by lookup key");
    tracing::info!("  POST /create-checkout-session        - Hosted checkout (303)");
    tracing::info!("  POST /checkout-subscription-success  - Customer for a session");
    tracing::info!("  POST /customer-portal                - Billing portal (303)");
    tracing::info!("  POST /create-no-trial-subscription   - Pay-now subscription");
    tracing::info!("  POST /create-free-trial-subscription - 14-day trial");
    tracing::info!("  POST /setup-intent                   - Save a payment method");
    tracing::info!("  POST /webhook                        - Stripe events");

    axum::serve(listener, router).await?;

    Ok(())
}
