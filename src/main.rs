//! Student Pay API server
//!
//! Binds the HTTP listener, wires real collaborators (PostgreSQL, Stripe,
//! SendGrid) into the handler state, and serves until shutdown.

use std::sync::Arc;

use clap::Parser;

use student_pay::{app_router, AppState, Config, PgStorage, SendGridClient, StripeClient};

/// Student Pay API Server
#[derive(Parser, Debug)]
#[command(name = "student-pay")]
#[command(version)]
#[command(about = "Registration and payment API over PostgreSQL, Stripe, and SendGrid")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;

    let storage = PgStorage::connect(&config.database_url).await?;
    storage.migrate().await?;

    let state = Arc::new(AppState::new(
        Arc::new(storage),
        Arc::new(StripeClient::new(&config.stripe_secret_key)),
        Arc::new(SendGridClient::new(
            &config.sendgrid_api_key,
            &config.from_email,
        )),
        &config,
    ));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("student-pay listening on {addr}");

    axum::serve(listener, app_router(state)).await?;
    Ok(())
}
