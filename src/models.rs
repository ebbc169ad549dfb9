//! Persisted record types
//!
//! Two entities live in the relational store: [`User`] and [`Transaction`].
//! Rows are mapped with `sqlx::FromRow`; amounts use `rust_decimal` to match
//! the `NUMERIC(10,2)` column without floating-point drift.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// `stripe_customer_id` is assigned by a follow-up update once Stripe
/// confirms customer creation; a user may exist without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Surrogate primary key
    pub id: i32,
    /// Unique, normalized email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Optional E.164 phone number
    pub phone_number: Option<String>,
    /// Preferred language code (one of the configured supported set)
    pub language: String,
    /// Stripe customer reference, if registration with the gateway succeeded
    pub stripe_customer_id: Option<String>,
}

/// Fields required to insert a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Normalized email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Optional validated phone number
    pub phone_number: Option<String>,
    /// Preferred language code
    pub language: String,
}

/// Lifecycle status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Intent created at the gateway, awaiting confirmation
    Pending,
    /// Confirmed by the gateway
    Succeeded,
    /// Rejected or abandoned
    Failed,
}

impl TransactionStatus {
    /// String form as stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// A recorded payment attempt.
///
/// A row is written only after the gateway accepted the payment-intent
/// creation call; requests that fail validation or fail at the gateway
/// leave no trace here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    /// Surrogate primary key
    pub id: i32,
    /// Owning user
    pub user_id: i32,
    /// Charged amount, strictly positive
    pub amount: Decimal,
    /// 3-letter currency code as sent to the gateway
    pub currency: String,
    /// Current lifecycle status
    pub status: TransactionStatus,
    /// Stripe payment-intent reference
    pub stripe_payment_intent_id: Option<String>,
    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a [`Transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Owning user
    pub user_id: i32,
    /// Charged amount
    pub amount: Decimal,
    /// 3-letter currency code
    pub currency: String,
    /// Initial status
    pub status: TransactionStatus,
    /// Stripe payment-intent reference
    pub stripe_payment_intent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        assert_eq!(TransactionStatus::Pending.as_str(), "pending");
    }

    #[test]
    fn test_user_serialization_keeps_null_customer_id() {
        let user = User {
            id: 1,
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            phone_number: None,
            language: "en".to_string(),
            stripe_customer_id: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json["stripe_customer_id"].is_null());
    }
}
