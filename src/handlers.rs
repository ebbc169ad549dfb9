//! HTTP request handlers
//!
//! The two business operations plus health/status probes:
//! - `POST /user` - register a user, then register them with Stripe
//! - `POST /payment` - create a payment intent and record the transaction
//! - `GET /health`, `GET /status` - liveness and runtime counters
//!
//! # Control flow
//!
//! ```text
//! Request ──▶ Validation ──▶ Storage (write) ──▶ Stripe ──▶ Storage (update)
//!                                                  │
//!                                                  └──▶ Receipt email (spawned,
//!                                                       off the critical path)
//! ```
//!
//! Collaborators are injected through [`AppState`] as trait objects, so the
//! whole surface is testable against in-memory doubles. The ordering
//! invariant for payments: no transaction row is written unless the gateway
//! accepted the payment-intent call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::email::{ReceiptDetails, ReceiptSender};
use crate::error::{ApiError, ApiResult};
use crate::models::NewUser;
use crate::storage::{pending_transaction, Storage};
use crate::stripe::PaymentGateway;
use crate::validation::{validate_amount, validate_email, validate_phone};

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Request/Response Types
// ============================================================================

/// `POST /user` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    /// Email address; validated and normalized before any write
    pub email: String,
    /// Display name
    pub name: String,
    /// Preferred language; defaults to the configured default
    #[serde(default)]
    pub language: Option<String>,
    /// Optional E.164 phone number
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// `POST /user` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// Id of the created user row
    pub user_id: i32,
    /// Stripe customer id; `null` when gateway registration failed
    pub stripe_customer_id: Option<String>,
}

/// `POST /payment` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    /// Paying user
    pub user_id: i32,
    /// Amount to charge, strictly positive
    pub amount: Decimal,
    /// 3-letter currency code
    pub currency: String,
}

/// `POST /payment` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// Token the client uses to complete authorization
    pub client_secret: String,
    /// Id of the recorded transaction row
    pub transaction_id: i32,
    /// Stripe payment-intent id
    pub stripe_payment_intent_id: String,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" if the process is responding
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// `GET /status` body with runtime counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,
    /// Server name
    pub name: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Users created since startup
    pub users_created: u64,
    /// Payments accepted since startup
    pub payments_processed: u64,
    /// Always "running" if responding
    pub status: String,
    /// ISO8601 timestamp of when status was generated
    pub timestamp: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared state for all handlers.
///
/// Collaborators are constructed once at process start and passed in
/// explicitly; there is no global registry. Counters are atomics so the
/// state is freely shareable across request tasks.
pub struct AppState {
    storage: Arc<dyn Storage>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn ReceiptSender>,
    supported_languages: Vec<String>,
    default_language: String,
    start_time: Instant,
    users_created: AtomicU64,
    payments_processed: AtomicU64,
}

impl AppState {
    /// Wire up handler state from collaborators and configuration.
    pub fn new(
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn ReceiptSender>,
        config: &Config,
    ) -> Self {
        Self {
            storage,
            gateway,
            mailer,
            supported_languages: config.supported_languages.clone(),
            default_language: config.default_language.clone(),
            start_time: Instant::now(),
            users_created: AtomicU64::new(0),
            payments_processed: AtomicU64::new(0),
        }
    }

    /// Users created since startup.
    pub fn users_created(&self) -> u64 {
        self.users_created.load(Ordering::Relaxed)
    }

    /// Payments accepted since startup.
    pub fn payments_processed(&self) -> u64 {
        self.payments_processed.load(Ordering::Relaxed)
    }

    fn resolve_language(&self, requested: Option<String>) -> ApiResult<String> {
        match requested {
            Some(language) => {
                if self.supported_languages.iter().any(|l| l == &language) {
                    Ok(language)
                } else {
                    Err(ApiError::UnsupportedLanguage)
                }
            }
            None => Ok(self.default_language.clone()),
        }
    }
}

fn valid_currency_shape(currency: &str) -> bool {
    currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic())
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// Register a user and best-effort register them with Stripe.
///
/// Validation failures respond 400 before any write. The Stripe call is
/// non-fatal: the user row survives a gateway failure and the response then
/// carries `stripe_customer_id: null`.
#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreateUserResponse>)> {
    let email = validate_email(&body.email).ok_or(ApiError::InvalidEmail)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::InvalidName);
    }

    // An empty string counts as "not provided".
    let phone_number = body.phone_number.filter(|p| !p.is_empty());
    if let Some(phone) = &phone_number {
        if !validate_phone(phone) {
            return Err(ApiError::InvalidPhone);
        }
    }

    let language = state.resolve_language(body.language)?;

    let user = state
        .storage
        .create_user(NewUser {
            email: email.clone(),
            name: body.name.clone(),
            phone_number,
            language,
        })
        .await?;
    state.users_created.fetch_add(1, Ordering::Relaxed);
    info!(user_id = user.id, "user created");

    let stripe_customer_id = match state.gateway.create_customer(&email, &body.name).await {
        Ok(customer_id) => {
            if let Err(e) = state
                .storage
                .set_stripe_customer_id(user.id, &customer_id)
                .await
            {
                // The user row stays valid without the reference.
                warn!(user_id = user.id, error = %e, "failed to store stripe customer id");
            }
            Some(customer_id)
        }
        Err(e) => {
            warn!(user_id = user.id, error = %e, "stripe customer creation failed");
            None
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user_id: user.id,
            stripe_customer_id,
        }),
    ))
}

/// Create a payment intent for a user and record the transaction.
///
/// The transaction row is written only after the gateway accepts the
/// intent-creation call; a gateway failure responds 500 with nothing
/// persisted. The receipt email runs off the critical path.
#[instrument(skip_all, fields(user_id = body.user_id))]
pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let user = state.storage.get_user(body.user_id).await?;

    if !validate_amount(body.amount) {
        return Err(ApiError::InvalidAmount);
    }
    if !valid_currency_shape(&body.currency) {
        return Err(ApiError::InvalidCurrency);
    }

    let intent = state
        .gateway
        .create_payment_intent(body.amount, &body.currency, user.stripe_customer_id.as_deref())
        .await?;

    let transaction = state
        .storage
        .create_transaction(pending_transaction(
            user.id,
            body.amount,
            &body.currency,
            &intent.id,
        ))
        .await?;
    state.payments_processed.fetch_add(1, Ordering::Relaxed);
    info!(
        transaction_id = transaction.id,
        intent_id = %intent.id,
        "payment intent recorded"
    );

    // Receipt delivery must not delay or fail the payment response.
    let mailer = Arc::clone(&state.mailer);
    let recipient = user.email.clone();
    let details = ReceiptDetails {
        amount: transaction.amount,
        currency: transaction.currency.clone(),
        transaction_id: transaction.id,
    };
    tokio::spawn(async move {
        if let Err(e) = mailer.send_receipt(&recipient, &details).await {
            warn!(transaction_id = details.transaction_id, error = %e, "receipt email failed");
        }
    });

    Ok(Json(PaymentResponse {
        client_secret: intent.client_secret,
        transaction_id: transaction.id,
        stripe_payment_intent_id: intent.id,
    }))
}

/// Liveness probe.
#[instrument(skip_all)]
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    debug!("health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// Runtime status with request counters.
#[instrument(skip_all)]
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        users_created: state.users_created(),
        payments_processed: state.payments_processed(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Router Setup
// ============================================================================

/// Build the application router.
///
/// CORS is wide open; the service sits behind a browser frontend.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user", post(create_user))
        .route("/payment", post(process_payment))
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
