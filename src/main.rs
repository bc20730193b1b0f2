//! shoot-admission - admission webhook for Gardener Shoot resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration and feature gates from the environment
//! - Starts the health server, and the webhook server when TLS material is mounted

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use shoot_admission::health::{HealthState, run_health_server};
use shoot_admission::{Config, features, run_webhook_server};

/// Grace period for in-flight admission reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shoot_admission=info".parse()?),
        )
        .json()
        .init();

    info!("Starting shoot-admission");

    let config = Config::from_env()?;
    features::init(config.feature_gates.clone())?;
    info!(
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        feature_gates = ?config.feature_gates,
        "Loaded configuration"
    );

    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = if config.tls_available() {
        info!("TLS certificates found, starting webhook server");
        let health_state = health_state.clone();
        let config = config.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_webhook_server(&config, health_state).await {
                error!("Webhook server error: {}", e);
            }
        }))
    } else {
        info!(
            cert_path = %config.cert_path.display(),
            "Webhook certificates not found, webhook server disabled"
        );
        None
    };

    health_state.set_ready(true).await;

    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = async {
            match webhook_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            info!("Marked service as not ready");

            info!(
                "Waiting {}s for in-flight admission reviews to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("shoot-admission stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal; the service cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
