//! Gerai payment reconciliation worker.
//!
//! Runs the payment-check consumer: orders still `Pending` when their
//! grace period expires have their reserved stock released and are
//! cancelled. Deployed separately from the API server so reconciliation
//! keeps running through API restarts.

#![cfg_attr(not(test), forbid(unsafe_code))]

use gerai_api::config::Config;
use gerai_api::queue::{PaymentCheckConsumer, PaymentCheckQueue};
use gerai_api::{db, observability};

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = Config::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = observability::init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    observability::init_tracing();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let queue = PaymentCheckQueue::new(pool.clone(), config.queue.visibility_timeout);
    let consumer = PaymentCheckConsumer::new(pool, queue, config.queue.poll_interval);

    tokio::select! {
        () = consumer.run() => {
            // run() only returns if the loop is broken, which it never is
            tracing::error!("consumer loop exited unexpectedly");
        }
        () = shutdown_signal() => {}
    }

    tracing::info!("worker stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping worker");
}
