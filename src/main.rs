//! OCPP 1.6J central system: WebSocket server for EV charging stations,
//! configured entirely from the process environment.

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ocpp_csms::config::{Config, LogFormat};
use ocpp_csms::liveness;
use ocpp_csms::support::errors::InfraError;
use ocpp_csms::support::shutdown::ShutdownCoordinator;
use ocpp_csms::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!("starting OCPP 1.6J central system");

    let state = AppState::new(config.bridge_url.clone(), config.bridge_secret.clone());

    let shutdown = ShutdownCoordinator::new(30);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    liveness::spawn_sweeps(state.clone(), shutdown_signal.clone());

    let app = ocpp_csms::app(state);

    let listener = tokio::net::TcpListener::bind(config.address())
        .await
        .map_err(InfraError::Bind)?;
    info!(address = %config.address(), "listening");

    let grace_period = shutdown.grace_period();
    let drain_signal = shutdown_signal.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                drain_signal.wait().await;
                info!("shutdown signal received, draining connections");
            })
            .await
    });

    shutdown_signal.wait().await;
    match tokio::time::timeout(grace_period, server).await {
        Ok(result) => result??,
        Err(_) => warn!(grace_period_secs = grace_period.as_secs(), "grace period elapsed, exiting anyway"),
    }

    info!("central system stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            if registry.with(fmt::layer().json()).try_init().is_err() {
                warn!("tracing already initialized");
            }
        }
        LogFormat::Pretty => {
            if registry.with(fmt::layer()).try_init().is_err() {
                warn!("tracing already initialized");
            }
        }
    }
}
