//! Receipt email client
//!
//! Best-effort notification sink over the SendGrid v3 mail API. A failed
//! send never rolls back a payment or its transaction record; callers log
//! the failure and move on.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::EmailError;

/// Production SendGrid API base URL.
pub const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// Details rendered into a payment receipt.
#[derive(Debug, Clone)]
pub struct ReceiptDetails {
    /// Charged amount
    pub amount: Decimal,
    /// 3-letter currency code
    pub currency: String,
    /// Local transaction record id
    pub transaction_id: i32,
}

/// Seam between request handlers and the email delivery API.
#[async_trait]
pub trait ReceiptSender: Send + Sync + 'static {
    /// Send a payment receipt to `to_email`.
    async fn send_receipt(
        &self,
        to_email: &str,
        details: &ReceiptDetails,
    ) -> Result<(), EmailError>;
}

/// reqwest-backed [`ReceiptSender`] using SendGrid.
pub struct SendGridClient {
    http: reqwest::Client,
    api_key: String,
    from_email: String,
    api_base: String,
}

impl SendGridClient {
    /// Create a client for the production SendGrid API.
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self::with_api_base(api_key, from_email, SENDGRID_API_BASE)
    }

    /// Create a client against a custom API base (test server).
    pub fn with_api_base(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            from_email: from_email.into(),
            api_base: api_base.into(),
        }
    }
}

fn receipt_body(from_email: &str, to_email: &str, details: &ReceiptDetails) -> serde_json::Value {
    json!({
        "personalizations": [{ "to": [{ "email": to_email }] }],
        "from": { "email": from_email },
        "subject": "Payment Receipt",
        "content": [{
            "type": "text/html",
            "value": format!(
                "<strong>Payment Receipt</strong>\
                 <p>Amount: {} {}</p>\
                 <p>Transaction ID: {}</p>",
                details.amount, details.currency, details.transaction_id
            ),
        }],
    })
}

#[async_trait]
impl ReceiptSender for SendGridClient {
    #[instrument(skip(self, details), fields(transaction_id = details.transaction_id))]
    async fn send_receipt(
        &self,
        to_email: &str,
        details: &ReceiptDetails,
    ) -> Result<(), EmailError> {
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&receipt_body(&self.from_email, to_email, details))
            .send()
            .await?;

        // SendGrid acknowledges accepted mail with 202.
        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Api {
                status: status.as_u16(),
            });
        }
        debug!("receipt email accepted");
        Ok(())
    }
}

/// [`ReceiptSender`] that drops every message. Used in tests and when no
/// email provider is configured.
#[derive(Debug, Clone, Default)]
pub struct NoOpReceiptSender;

#[async_trait]
impl ReceiptSender for NoOpReceiptSender {
    async fn send_receipt(
        &self,
        _to_email: &str,
        _details: &ReceiptDetails,
    ) -> Result<(), EmailError> {
        Ok(())
    }
}
