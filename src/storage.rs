//! Persistence layer
//!
//! The [`Storage`] trait is the seam between request handlers and the
//! relational store. [`PgStorage`] is the production implementation backed
//! by a PostgreSQL pool; [`InMemoryStorage`] backs the test suite so no
//! database is needed to exercise the HTTP surface.
//!
//! Every method is a single atomic write or read. No multi-row transaction
//! spans a gateway call: the external call always happens between two
//! separate storage calls.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::StorageError;
use crate::models::{NewTransaction, NewUser, Transaction, TransactionStatus, User};

/// Durable storage for user and transaction records.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Insert a user. Fails with [`StorageError::DuplicateEmail`] when the
    /// email is already registered.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StorageError>;

    /// Fetch a user by id.
    async fn get_user(&self, user_id: i32) -> Result<User, StorageError>;

    /// Attach the external payment-customer reference to a user.
    async fn set_stripe_customer_id(
        &self,
        user_id: i32,
        customer_id: &str,
    ) -> Result<(), StorageError>;

    /// Insert a transaction record.
    async fn create_transaction(
        &self,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, StorageError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        email VARCHAR(120) NOT NULL UNIQUE,
        name VARCHAR(100) NOT NULL,
        phone_number VARCHAR(20),
        language VARCHAR(10) NOT NULL DEFAULT 'en',
        stripe_customer_id VARCHAR(50) UNIQUE
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)",
    "CREATE TABLE IF NOT EXISTS transactions (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users (id),
        amount NUMERIC(10, 2) NOT NULL,
        currency VARCHAR(3) NOT NULL,
        status VARCHAR(20) NOT NULL,
        stripe_payment_intent_id VARCHAR(50) UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

const USER_COLUMNS: &str = "id, email, name, phone_number, language, stripe_customer_id";
const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, currency, status, stripe_payment_intent_id, created_at";

/// PostgreSQL-backed [`Storage`] implementation.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect to the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` and `transactions` tables when absent.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("database schema ready");
        Ok(())
    }
}

fn map_unique_violation(err: sqlx::Error, mapped: StorageError) -> StorageError {
    let is_unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if is_unique {
        mapped
    } else {
        StorageError::Database(err)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StorageError> {
        let sql = format!(
            "INSERT INTO users (email, name, phone_number, language)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.phone_number)
            .bind(&new_user.language)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, StorageError::DuplicateEmail))
    }

    async fn get_user(&self, user_id: i32) -> Result<User, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UserNotFound(user_id))
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: i32,
        customer_id: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET stripe_customer_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn create_transaction(
        &self,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, StorageError> {
        let sql = format!(
            "INSERT INTO transactions (user_id, amount, currency, status, stripe_payment_intent_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TRANSACTION_COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(new_transaction.user_id)
            .bind(new_transaction.amount)
            .bind(&new_transaction.currency)
            .bind(new_transaction.status)
            .bind(&new_transaction.stripe_payment_intent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)
    }
}

// ============================================================================
// In-memory (test support)
// ============================================================================

#[derive(Default)]
struct InMemoryInner {
    users: Vec<User>,
    transactions: Vec<Transaction>,
}

/// In-memory [`Storage`] implementation.
///
/// Mirrors the PostgreSQL behaviour closely enough for handler tests:
/// sequential ids, email uniqueness, and server-assigned monotonic
/// timestamps.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<InMemoryInner>,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    /// Number of stored transactions.
    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }

    /// Snapshot of all stored transactions.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.read().transactions.clone()
    }

    /// Snapshot of a stored user, if present.
    pub fn user(&self, user_id: i32) -> Option<User> {
        self.inner
            .read()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StorageError> {
        let mut inner = self.inner.write();
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(StorageError::DuplicateEmail);
        }
        let user = User {
            id: inner.users.len() as i32 + 1,
            email: new_user.email,
            name: new_user.name,
            phone_number: new_user.phone_number,
            language: new_user.language,
            stripe_customer_id: None,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Result<User, StorageError> {
        self.inner
            .read()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StorageError::UserNotFound(user_id))
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: i32,
        customer_id: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StorageError::UserNotFound(user_id))?;
        user.stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn create_transaction(
        &self,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, StorageError> {
        let mut inner = self.inner.write();
        let transaction = Transaction {
            id: inner.transactions.len() as i32 + 1,
            user_id: new_transaction.user_id,
            amount: new_transaction.amount,
            currency: new_transaction.currency,
            status: new_transaction.status,
            stripe_payment_intent_id: new_transaction.stripe_payment_intent_id,
            created_at: chrono::Utc::now(),
        };
        inner.transactions.push(transaction.clone());
        Ok(transaction)
    }
}

/// Shorthand for a pending transaction insert.
pub fn pending_transaction(
    user_id: i32,
    amount: rust_decimal::Decimal,
    currency: &str,
    intent_id: &str,
) -> NewTransaction {
    NewTransaction {
        user_id,
        amount,
        currency: currency.to_string(),
        status: TransactionStatus::Pending,
        stripe_payment_intent_id: Some(intent_id.to_string()),
    }
}
