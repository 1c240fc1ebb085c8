//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use serde::{Deserialize, Serialize};

use billing_payments::{
    CheckoutRequest, Customer, FreeTrialSubscriptionRequest, IntentOutcome,
    NoTrialSubscriptionRequest, Price, SetupIntentRequest, Subscription,
};

use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishableKeyResponse {
    pub publishable_key: String,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub prices: Vec<Price>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer: Customer,
}

#[derive(Debug, Default, Deserialize)]
pub struct PortalRequest {
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
}

/// `{clientSecret, customerId}` or `{customerExist: true}`
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IntentResponse {
    #[serde(rename_all = "camelCase")]
    ClientSecret {
        client_secret: String,
        customer_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CustomerExist { customer_exist: bool },
}

impl From<IntentOutcome> for IntentResponse {
    fn from(outcome: IntentOutcome) -> Self {
        match outcome {
            IntentOutcome::Created {
                client_secret,
                customer_id,
            }
            | IntentOutcome::Resumed {
                client_secret,
                customer_id,
            } => Self::ClientSecret {
                client_secret,
                customer_id,
            },
            IntentOutcome::CustomerExists => Self::CustomerExist {
                customer_exist: true,
            },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Publishable key for Stripe.js
pub async fn load_stripe(State(state): State<AppState>) -> Json<PublishableKeyResponse> {
    Json(PublishableKeyResponse {
        publishable_key: state.gateway.publishable_key().to_string(),
    })
}

pub async fn load_prices(State(state): State<AppState>) -> ApiResult<Json<PricesResponse>> {
    let prices = state.gateway.load_prices().await?;
    Ok(Json(PricesResponse { prices }))
}

/// Create Stripe checkout session and send the browser there
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<Redirect> {
    let url = state.gateway.create_checkout_session(payload).await?;
    Ok(Redirect::to(&url))
}

pub async fn checkout_subscription_success(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> ApiResult<Json<CustomerResponse>> {
    let customer = state
        .gateway
        .checkout_success(payload.session_id.as_deref())
        .await?;
    Ok(Json(CustomerResponse { customer }))
}

pub async fn customer_portal(
    State(state): State<AppState>,
    Json(payload): Json<PortalRequest>,
) -> ApiResult<Redirect> {
    let url = state
        .gateway
        .customer_portal(payload.customer.as_deref())
        .await?;
    Ok(Redirect::to(&url))
}

pub async fn create_no_trial_subscription(
    State(state): State<AppState>,
    Json(payload): Json<NoTrialSubscriptionRequest>,
) -> ApiResult<Json<IntentResponse>> {
    let outcome = state.gateway.create_no_trial_subscription(payload).await?;
    Ok(Json(outcome.into()))
}

pub async fn create_free_trial_subscription(
    State(state): State<AppState>,
    Json(payload): Json<FreeTrialSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let subscription = state.gateway.create_free_trial_subscription(payload).await?;
    Ok(Json(SubscriptionResponse { subscription }))
}

pub async fn setup_intent(
    State(state): State<AppState>,
    Json(payload): Json<SetupIntentRequest>,
) -> ApiResult<Json<IntentResponse>> {
    let outcome = state.gateway.create_setup_intent(payload).await?;
    Ok(Json(outcome.into()))
}

/// Stripe webhook handler
///
/// Bad signatures come back as `ApiError` and are written as a plain-text 400;
/// everything that verifies and dispatches cleanly gets an empty 200.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    state.webhooks.process(&body, signature).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, Response, header},
    };
    use billing_payments::{BillingConfig, WebhookVerifier, mock::MockProvider};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    const WEBHOOK_SECRET: &str = "whsec_route_tests";

    fn app(mock: &Arc<MockProvider>) -> Router {
        let config = BillingConfig::new("sk_test_123", "pk_test_123", WEBHOOK_SECRET)
            .with_client_url("https://app.example.com")
            .with_price_lookup_keys(["basic_monthly"]);
        crate::app(AppState::new(mock.clone(), config), "static")
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn webhook_request(body: &[u8], signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/webhook");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        builder.body(Body::from(body.to_vec())).unwrap()
    }

    #[tokio::test]
    async fn test_load_stripe_returns_publishable_key() {
        let mock = Arc::new(MockProvider::new());
        let request = Request::builder().uri("/load-stripe").body(Body::empty()).unwrap();
        let response = app(&mock).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"publishableKey": "pk_test_123"}));
    }

    #[tokio::test]
    async fn test_empty_price_list_is_ok() {
        let mock = Arc::new(MockProvider::new());
        let request = Request::builder().uri("/load-prices").body(Body::empty()).unwrap();
        let response = app(&mock).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"prices": []}));
    }

    #[tokio::test]
    async fn test_prices_filtered_by_lookup_key() {
        let mock = Arc::new(MockProvider::new());
        let basic = mock.add_price("basic_monthly", 500);
        mock.add_price("legacy_monthly", 900);

        let request = Request::builder().uri("/load-prices").body(Body::empty()).unwrap();
        let body = body_json(app(&mock).oneshot(request).await.unwrap()).await;

        let prices = body["prices"].as_array().unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0]["id"], json!(basic.id));
        assert_eq!(prices[0]["lookupKey"], json!("basic_monthly"));
    }

    #[tokio::test]
    async fn test_checkout_redirects_with_see_other() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(
            app(&mock),
            "/create-checkout-session",
            json!({"price": "price_1", "email": "a@x.com", "userId": "u1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://checkout.stripe.test/"));
    }

    #[tokio::test]
    async fn test_checkout_without_user_is_rejected() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(
            app(&mock),
            "/create-checkout-session",
            json!({"price": "price_1", "email": "a@x.com"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], json!("VALIDATION_ERROR"));
        assert_eq!(mock.calls("create_checkout_session"), 0);
    }

    #[tokio::test]
    async fn test_no_trial_end_to_end() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(
            app(&mock),
            "/create-no-trial-subscription",
            json!({"name": "A", "email": "a@x.com", "userId": "u1", "priceId": "p1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;

        let customers = mock.customers();
        assert_eq!(customers.len(), 1);
        assert_eq!(body["customerId"], json!(customers[0].id));
        assert_eq!(
            body["clientSecret"].as_str(),
            mock.subscriptions()[0].client_secret.as_deref()
        );
    }

    #[tokio::test]
    async fn test_no_trial_existing_customer() {
        let mock = Arc::new(MockProvider::new());
        mock.add_customer("a@x.com");

        let response = post_json(
            app(&mock),
            "/create-no-trial-subscription",
            json!({"name": "A", "email": "a@x.com", "userId": "u1", "priceId": "p1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"customerExist": true}));
        assert_eq!(mock.calls("create_subscription"), 0);
    }

    #[tokio::test]
    async fn test_setup_intent_returns_client_secret() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(
            app(&mock),
            "/setup-intent",
            json!({"name": "A", "email": "a@x.com", "userId": "u1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["clientSecret"].as_str().unwrap().starts_with("seti_"));
        assert_eq!(body["customerId"], json!(mock.customers()[0].id));
    }

    #[tokio::test]
    async fn test_free_trial_returns_subscription() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(
            app(&mock),
            "/create-free-trial-subscription",
            json!({
                "userId": "u1",
                "email": "a@x.com",
                "customerId": "cus_1",
                "paymentMethod": "pm_1",
                "priceId": "p1"
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["subscription"]["customerId"], json!("cus_1"));
        assert_eq!(body["subscription"]["status"], json!("trialing"));
    }

    #[tokio::test]
    async fn test_checkout_success_returns_customer() {
        let mock = Arc::new(MockProvider::new());
        let customer = mock.add_customer("a@x.com");
        let session = mock.add_checkout_session(&customer.id);

        let response = post_json(
            app(&mock),
            "/checkout-subscription-success",
            json!({"sessionId": session.id}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["customer"]["id"], json!(customer.id));
    }

    #[tokio::test]
    async fn test_customer_portal_redirects() {
        let mock = Arc::new(MockProvider::new());
        let response = post_json(app(&mock), "/customer-portal", json!({"customer": "cus_1"})).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://billing.stripe.test/p/session/cus_1"
        );
    }

    #[tokio::test]
    async fn test_provider_failure_is_bad_gateway() {
        let mock = Arc::new(MockProvider::new());
        mock.fail_with("connection reset");

        let request = Request::builder().uri("/load-prices").body(Body::empty()).unwrap();
        let response = app(&mock).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["code"], json!("PROVIDER_ERROR"));
        assert!(!body["error"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_webhook_bad_signature_is_plain_400() {
        let mock = Arc::new(MockProvider::new());
        let body = json!({
            "id": "evt_1",
            "type": "setup_intent.succeeded",
            "data": {"object": {"id": "seti_1", "customer": "cus_1", "payment_method": "pm_1"}}
        })
        .to_string();

        let response = app(&mock)
            .oneshot(webhook_request(body.as_bytes(), Some("t=1,v1=00")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("Webhook Error:"));

        let response = app(&mock)
            .oneshot(webhook_request(body.as_bytes(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_webhook_signed_event_is_acknowledged_empty() {
        let mock = Arc::new(MockProvider::new());
        let body = json!({
            "id": "evt_1",
            "type": "setup_intent.succeeded",
            "data": {"object": {"id": "seti_1", "customer": "cus_1", "payment_method": "pm_1"}}
        })
        .to_string();
        let signature = WebhookVerifier::new(WEBHOOK_SECRET, 300)
            .sign(body.as_bytes(), chrono::Utc::now().timestamp())
            .unwrap();

        let response = app(&mock)
            .oneshot(webhook_request(body.as_bytes(), Some(&signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());
        assert_eq!(mock.customer_default_payment_method("cus_1").as_deref(), Some("pm_1"));
    }

    #[tokio::test]
    async fn test_webhook_unknown_event_is_acknowledged() {
        let mock = Arc::new(MockProvider::new());
        let body = json!({"id": "evt_2", "type": "price.created", "data": {"object": {}}}).to_string();
        let signature = WebhookVerifier::new(WEBHOOK_SECRET, 300)
            .sign(body.as_bytes(), chrono::Utc::now().timestamp())
            .unwrap();

        let response = app(&mock)
            .oneshot(webhook_request(body.as_bytes(), Some(&signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(mock.total_calls(), 0);
    }
}
