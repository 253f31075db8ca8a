//! # Gatehouse - Flash Notes auth gate
//!
//! Serves CAPTCHA challenges, mints and checks password reset links, and
//! issues and redeems mobile OTPs for the Flash Notes web application.
//!
//! ## Architecture
//! ```text
//! Browser → Notes app → Gatehouse
//!                           ↓
//!              Session store (memory | Redis)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod config;
mod mail;
mod otp;
mod routes;
mod session;
mod state;
mod token;

use config::{AppConfig, SessionBackend};
use otp::{OtpStore, otp_sweeper};
use session::session_sweeper;
use state::AppState;

/// Flash Notes Gatehouse - CAPTCHA, reset links, and OTPs
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Redis URL for the redis session backend (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Token signing secret (overrides config)
    #[arg(long, env = "GATEHOUSE_SECRET", hide_env_values = true)]
    secret_key: Option<String>,

    /// SMTP login; without one, mail is only logged (overrides config)
    #[arg(long, env = "MAIL_USERNAME")]
    smtp_username: Option<String>,

    /// SMTP password (overrides config)
    #[arg(long, env = "MAIL_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Flash Notes Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("Configuration loaded from {}", args.config);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // OTP store lives for the whole process
    let otps = Arc::new(OtpStore::new());

    if config.otp.sweep_interval_secs > 0 {
        let sweeper_store = otps.clone();
        let interval = Duration::from_secs(config.otp.sweep_interval_secs);
        let sweeper_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            otp_sweeper(sweeper_store, interval, sweeper_shutdown).await;
        });
    }

    // Outbound mail
    let mailer = mail::mailer_from_config(&config.mail)?;
    info!("Mail transport: {}", mailer.transport_name());

    // Initialize application state
    let listen_addr = config.listen_addr.clone();
    let session_backend = config.session.backend;
    let session_sweep_secs = config.session.sweep_interval_secs;
    let state = AppState::new(config, otps, mailer).await?;
    info!("Session backend ready: {}", state.sessions.backend_name());

    // Redis expires sessions itself
    if session_backend == SessionBackend::Memory && session_sweep_secs > 0 {
        let sweeper_sessions = state.sessions.clone();
        let interval = Duration::from_secs(session_sweep_secs);
        let sweeper_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            session_sweeper(sweeper_sessions, interval, sweeper_shutdown).await;
        });
    }

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("Gatehouse listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c(), shutdown_tx))
        .await
        .context("Server error")?;

    info!("Gatehouse shutdown complete");
    Ok(())
}

/// Resolves once `signal` fires, telling background tasks to stop.
/// If the signal handler cannot be installed this never resolves, so the
/// server keeps running instead of shutting down at startup.
async fn shutdown_signal<F>(signal: F, shutdown_tx: tokio::sync::broadcast::Sender<()>)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_notifies_tasks() {
        let (tx, mut rx) = tokio::sync::broadcast::channel(1);
        shutdown_signal(async { Ok(()) }, tx).await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_handler_keeps_serving() {
        let (tx, mut rx) = tokio::sync::broadcast::channel(1);
        let failing = async { Err(std::io::Error::other("no signal handler")) };

        let waited =
            tokio::time::timeout(Duration::from_millis(50), shutdown_signal(failing, tx)).await;
        assert!(waited.is_err());
        assert!(rx.try_recv().is_err());
    }
}
