//! Student Pay - Registration and Payment API
//!
//! This crate provides an HTTP service that registers users and processes
//! payments: records live in PostgreSQL, money movement is delegated to
//! Stripe, and a receipt email goes out through SendGrid after a payment is
//! accepted.
//!
//! # Architecture
//!
//! ```text
//! Client ──▶ Axum Router ──▶ Handlers ──▶ Storage (PostgreSQL)
//!                               │
//!                               ├──▶ PaymentGateway (Stripe REST)
//!                               │
//!                               └──▶ ReceiptSender (SendGrid REST)
//! ```
//!
//! The transactional contract: a transaction row is persisted only after
//! Stripe accepts the payment-intent creation call, so a recorded payment
//! attempt and its status never diverge from the gateway's view.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use student_pay::{
//!     app_router, AppState, Config, InMemoryStorage, NoOpReceiptSender, StripeClient,
//! };
//!
//! # async fn run() {
//! let config = Config::test_config();
//! let state = Arc::new(AppState::new(
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(StripeClient::new(&config.stripe_secret_key)),
//!     Arc::new(NoOpReceiptSender),
//!     &config,
//! ));
//! let app = app_router(state);
//! // ... serve with axum
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod stripe;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use email::{NoOpReceiptSender, ReceiptDetails, ReceiptSender, SendGridClient};
pub use error::{ApiError, ApiResult, EmailError, GatewayError, StorageError};
pub use handlers::{app_router, AppState};
pub use models::{NewTransaction, NewUser, Transaction, TransactionStatus, User};
pub use storage::{InMemoryStorage, PgStorage, Storage};
pub use stripe::{PaymentGateway, PaymentIntent, StripeClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
