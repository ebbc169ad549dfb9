//! HTTP surface integration tests
//!
//! Drives the router end to end with in-memory storage and scripted
//! gateway/mailer doubles; no database or network required.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use student_pay::email::{ReceiptDetails, ReceiptSender};
use student_pay::{
    app_router, AppState, Config, EmailError, GatewayError, InMemoryStorage, NoOpReceiptSender,
    PaymentGateway, PaymentIntent, TransactionStatus,
};

/// Gateway double with scriptable failures and call counters.
#[derive(Default)]
struct ScriptedGateway {
    fail_customer: bool,
    fail_intent: bool,
    customer_calls: AtomicU32,
    intent_calls: AtomicU32,
}

impl ScriptedGateway {
    fn failing_customer() -> Self {
        Self {
            fail_customer: true,
            ..Self::default()
        }
    }

    fn failing_intent() -> Self {
        Self {
            fail_intent: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_customer(&self, _email: &str, _name: &str) -> Result<String, GatewayError> {
        self.customer_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_customer {
            return Err(GatewayError::Api {
                status: 401,
                message: "Invalid API Key provided".to_string(),
            });
        }
        Ok("cus_test_1".to_string())
    }

    async fn create_payment_intent(
        &self,
        _amount: Decimal,
        _currency: &str,
        _customer_id: Option<&str>,
    ) -> Result<PaymentIntent, GatewayError> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_intent {
            return Err(GatewayError::Api {
                status: 402,
                message: "Your card was declined".to_string(),
            });
        }
        Ok(PaymentIntent {
            id: "pi_test_1".to_string(),
            client_secret: "pi_test_1_secret_abc".to_string(),
        })
    }
}

/// Mailer double that always fails; payment responses must not notice.
struct FailingMailer;

#[async_trait]
impl ReceiptSender for FailingMailer {
    async fn send_receipt(
        &self,
        _to_email: &str,
        _details: &ReceiptDetails,
    ) -> Result<(), EmailError> {
        Err(EmailError::Api { status: 500 })
    }
}

struct TestApp {
    storage: Arc<InMemoryStorage>,
    gateway: Arc<ScriptedGateway>,
    state: Arc<AppState>,
}

fn test_app(gateway: ScriptedGateway) -> TestApp {
    test_app_with_mailer(gateway, Arc::new(NoOpReceiptSender))
}

fn test_app_with_mailer(
    gateway: ScriptedGateway,
    mailer: Arc<dyn ReceiptSender>,
) -> TestApp {
    let storage = Arc::new(InMemoryStorage::new());
    let gateway = Arc::new(gateway);
    let state = Arc::new(AppState::new(
        storage.clone(),
        gateway.clone(),
        mailer,
        &Config::test_config(),
    ));
    TestApp {
        storage,
        gateway,
        state,
    }
}

async fn post_json(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app_router(app.state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_user(app: &TestApp, email: &str) -> i32 {
    let (status, body) = post_json(app, "/user", json!({"email": email, "name": "Ada"})).await;
    assert_eq!(status, StatusCode::CREATED);
    body["user_id"].as_i64().unwrap() as i32
}

// ============================================================================
// POST /user
// ============================================================================

#[tokio::test]
async fn test_create_user_success() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) = post_json(
        &app,
        "/user",
        json!({"email": "ada@example.com", "name": "Ada Lovelace"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], 1);
    assert_eq!(body["stripe_customer_id"], "cus_test_1");

    let user = app.storage.user(1).unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_test_1"));
    assert_eq!(user.language, "en");
}

#[tokio::test]
async fn test_create_user_normalizes_email_domain() {
    let app = test_app(ScriptedGateway::default());
    let (status, _) = post_json(
        &app,
        "/user",
        json!({"email": "Ada@Example.COM", "name": "Ada"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.storage.user(1).unwrap().email, "Ada@example.com");
}

#[tokio::test]
async fn test_create_user_invalid_email_is_400_and_no_row() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) =
        post_json(&app, "/user", json!({"email": "not-an-email", "name": "A"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format");
    assert_eq!(app.storage.user_count(), 0);
    assert_eq!(app.gateway.customer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_user_invalid_phone_is_400_and_no_row() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) = post_json(
        &app,
        "/user",
        json!({"email": "a@example.com", "name": "A", "phone_number": "not a number"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid phone number");
    assert_eq!(app.storage.user_count(), 0);
}

#[tokio::test]
async fn test_create_user_valid_phone_is_stored() {
    let app = test_app(ScriptedGateway::default());
    let (status, _) = post_json(
        &app,
        "/user",
        json!({"email": "a@example.com", "name": "A", "phone_number": "+14155552671"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        app.storage.user(1).unwrap().phone_number.as_deref(),
        Some("+14155552671")
    );
}

#[tokio::test]
async fn test_create_user_gateway_failure_still_creates_user() {
    let app = test_app(ScriptedGateway::failing_customer());
    let (status, body) =
        post_json(&app, "/user", json!({"email": "a@example.com", "name": "A"})).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["stripe_customer_id"].is_null());

    let user = app.storage.user(1).unwrap();
    assert!(user.stripe_customer_id.is_none());
}

#[tokio::test]
async fn test_create_user_duplicate_email_is_409() {
    let app = test_app(ScriptedGateway::default());
    register_user(&app, "a@example.com").await;

    let (status, body) =
        post_json(&app, "/user", json!({"email": "a@example.com", "name": "B"})).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
    assert_eq!(app.storage.user_count(), 1);
}

#[tokio::test]
async fn test_create_user_unsupported_language_is_400() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) = post_json(
        &app,
        "/user",
        json!({"email": "a@example.com", "name": "A", "language": "de"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported language");
    assert_eq!(app.storage.user_count(), 0);
}

#[tokio::test]
async fn test_create_user_supported_language_is_stored() {
    let app = test_app(ScriptedGateway::default());
    let (status, _) = post_json(
        &app,
        "/user",
        json!({"email": "a@example.com", "name": "A", "language": "fr"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.storage.user(1).unwrap().language, "fr");
}

#[tokio::test]
async fn test_create_user_empty_name_is_400() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) =
        post_json(&app, "/user", json!({"email": "a@example.com", "name": "  "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name is required");
    assert_eq!(app.storage.user_count(), 0);
}

// ============================================================================
// POST /payment
// ============================================================================

#[tokio::test]
async fn test_payment_success() {
    let app = test_app(ScriptedGateway::default());
    let user_id = register_user(&app, "a@example.com").await;

    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 100.00, "currency": "usd"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_secret"], "pi_test_1_secret_abc");
    assert_eq!(body["stripe_payment_intent_id"], "pi_test_1");
    assert_eq!(body["transaction_id"], 1);

    let transactions = app.storage.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, dec!(100.00));
    assert_eq!(transactions[0].status, TransactionStatus::Pending);
    assert_eq!(transactions[0].user_id, user_id);
    assert_eq!(
        transactions[0].stripe_payment_intent_id.as_deref(),
        Some("pi_test_1")
    );
}

#[tokio::test]
async fn test_payment_unknown_user_is_404_and_no_row() {
    let app = test_app(ScriptedGateway::default());
    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": 42, "amount": 10.00, "currency": "usd"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
    assert_eq!(app.storage.transaction_count(), 0);
}

#[tokio::test]
async fn test_payment_negative_amount_rejected_before_gateway() {
    let app = test_app(ScriptedGateway::default());
    let user_id = register_user(&app, "a@example.com").await;

    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": -5, "currency": "usd"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid payment amount");
    assert_eq!(app.storage.transaction_count(), 0);
    // Rejection happens before any external side effect.
    assert_eq!(app.gateway.intent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_payment_zero_amount_is_400() {
    let app = test_app(ScriptedGateway::default());
    let user_id = register_user(&app, "a@example.com").await;

    let (status, _) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 0, "currency": "usd"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.transaction_count(), 0);
}

#[tokio::test]
async fn test_payment_bad_currency_shape_is_400() {
    let app = test_app(ScriptedGateway::default());
    let user_id = register_user(&app, "a@example.com").await;

    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 10.00, "currency": "dollars"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid currency code");
    assert_eq!(app.gateway.intent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_payment_gateway_failure_persists_nothing() {
    let app = test_app(ScriptedGateway::failing_intent());
    let user_id = register_user(&app, "a@example.com").await;

    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 10.00, "currency": "usd"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Payment processing failed");
    assert_eq!(app.storage.transaction_count(), 0);
}

#[tokio::test]
async fn test_payment_survives_receipt_email_failure() {
    let app = test_app_with_mailer(ScriptedGateway::default(), Arc::new(FailingMailer));
    let user_id = register_user(&app, "a@example.com").await;

    let (status, body) = post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 25.00, "currency": "usd"}),
    )
    .await;

    // Email delivery is best-effort; the payment result stands.
    assert_eq!(status, StatusCode::OK);
    assert!(!body["client_secret"].as_str().unwrap().is_empty());
    assert_eq!(app.storage.transaction_count(), 1);
}

// ============================================================================
// Probes
// ============================================================================

#[tokio::test]
async fn test_health_probe() {
    let app = test_app(ScriptedGateway::default());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app_router(app.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_counters_track_requests() {
    let app = test_app(ScriptedGateway::default());
    let user_id = register_user(&app, "a@example.com").await;
    post_json(
        &app,
        "/payment",
        json!({"user_id": user_id, "amount": 10.00, "currency": "usd"}),
    )
    .await;

    let request = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let response = app_router(app.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["users_created"], 1);
    assert_eq!(body["payments_processed"], 1);
    assert_eq!(body["status"], "running");
}
