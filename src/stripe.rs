//! Stripe payment gateway client
//!
//! Thin wrapper over two Stripe REST calls: customer creation and
//! payment-intent creation. Requests are form-encoded with bearer
//! authentication, per the Stripe API convention.
//!
//! ```text
//! create_customer ──────▶ POST /v1/customers        ──▶ customer id
//! create_payment_intent ▶ POST /v1/payment_intents  ──▶ {intent id, client secret}
//! ```
//!
//! Amounts are converted to Stripe's minor-unit integer representation
//! (multiply by 100, truncate) before the call. Callers decide whether a
//! failure is fatal: it is not for customer creation during registration,
//! it is for payment-intent creation.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::GatewayError;

/// Production Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// A created payment intent, as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    /// Server-side identifier used for reconciliation
    pub id: String,
    /// Opaque token the client uses to complete authorization
    pub client_secret: String,
}

/// Seam between request handlers and the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Register a payer with the processor; returns the customer id.
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, GatewayError>;

    /// Create a payment intent for `amount` in `currency`, optionally tied
    /// to an existing customer.
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        customer_id: Option<&str>,
    ) -> Result<PaymentIntent, GatewayError>;
}

/// Convert a decimal amount to Stripe's minor-unit integer form.
///
/// Multiplies by 100 and truncates: `10.999` becomes `1099`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or(GatewayError::AmountOutOfRange)
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

/// reqwest-backed [`PaymentGateway`] implementation.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    /// Create a client for the production Stripe API.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, STRIPE_API_BASE)
    }

    /// Create a client against a custom API base (stripe-mock, test server).
    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: extract_error_message(&response.bytes().await?),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

/// Pull the human-readable message out of a Stripe error body.
///
/// Stripe wraps errors as `{"error": {"message": "..."}}`; anything else
/// degrades to a generic message rather than echoing the raw body.
fn extract_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unrecognized gateway error response".to_string())
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self))]
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, GatewayError> {
        let customer: Customer = self
            .post_form("/customers", &[("email", email), ("name", name)])
            .await?;
        debug!(customer_id = %customer.id, "stripe customer created");
        Ok(customer.id)
    }

    #[instrument(skip(self))]
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        customer_id: Option<&str>,
    ) -> Result<PaymentIntent, GatewayError> {
        let minor_units = to_minor_units(amount)?.to_string();
        let mut params = vec![
            ("amount", minor_units.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];
        if let Some(customer) = customer_id {
            params.push(("customer", customer));
        }

        let intent: PaymentIntent = self.post_form("/payment_intents", &params).await?;
        debug!(intent_id = %intent.id, "stripe payment intent created");
        Ok(intent)
    }
}
