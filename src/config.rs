//! Environment-sourced application configuration
//!
//! All settings come from environment variables with the defaults the
//! service has always shipped with. Secrets (Stripe, SendGrid) have no
//! defaults and must be present at startup.

use anyhow::{bail, Context};
use std::env;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Stripe secret key (`STRIPE_SECRET_KEY`)
    pub stripe_secret_key: String,
    /// Stripe publishable key handed to clients (`STRIPE_PUBLISHABLE_KEY`)
    pub stripe_publishable_key: Option<String>,
    /// SendGrid API key (`SENDGRID_API_KEY`)
    pub sendgrid_api_key: String,
    /// Receipt sender address (`DEFAULT_FROM_EMAIL`)
    pub from_email: String,
    /// Application secret key (`SECRET_KEY`)
    pub secret_key: String,
    /// Languages users may select (`SUPPORTED_LANGUAGES`, comma-separated)
    pub supported_languages: Vec<String>,
    /// Fallback language when none is given (`DEFAULT_LANGUAGE`)
    pub default_language: String,
    /// Debug mode flag (`DEBUG`)
    pub debug: bool,
    /// Testing mode flag (`TESTING`)
    pub testing: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_languages(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Fails when a required secret is absent or when the default language
    /// is not in the supported set.
    pub fn from_env() -> anyhow::Result<Self> {
        let stripe_secret_key =
            env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;
        let sendgrid_api_key =
            env::var("SENDGRID_API_KEY").context("SENDGRID_API_KEY must be set")?;

        let supported_languages = parse_languages(&env_or("SUPPORTED_LANGUAGES", "en,es,fr,zh"));
        let default_language = env_or("DEFAULT_LANGUAGE", "en");
        if !supported_languages.contains(&default_language) {
            bail!("DEFAULT_LANGUAGE '{default_language}' is not in SUPPORTED_LANGUAGES");
        }

        Ok(Self {
            database_url: env_or("DATABASE_URL", "postgresql://localhost/student_payments"),
            stripe_secret_key,
            stripe_publishable_key: env::var("STRIPE_PUBLISHABLE_KEY").ok(),
            sendgrid_api_key,
            from_email: env_or("DEFAULT_FROM_EMAIL", "payments@studentprocessor.com"),
            secret_key: env_or("SECRET_KEY", "development_secret_key"),
            supported_languages,
            default_language,
            debug: env_flag("DEBUG"),
            testing: env_flag("TESTING"),
        })
    }

    /// Whether `language` is one of the supported codes.
    pub fn is_supported_language(&self, language: &str) -> bool {
        self.supported_languages.iter().any(|l| l == language)
    }

    /// Fixed configuration for tests; no environment access, no real keys.
    pub fn test_config() -> Self {
        Self {
            database_url: "postgresql://localhost/student_payments_test".to_string(),
            stripe_secret_key: "sk_test_placeholder".to_string(),
            stripe_publishable_key: Some("pk_test_placeholder".to_string()),
            sendgrid_api_key: "sendgrid_test_placeholder".to_string(),
            from_email: "payments@studentprocessor.com".to_string(),
            secret_key: "test_secret_key".to_string(),
            supported_languages: vec![
                "en".to_string(),
                "es".to_string(),
                "fr".to_string(),
                "zh".to_string(),
            ],
            default_language: "en".to_string(),
            debug: false,
            testing: true,
        }
    }
}
