use forgebot_core::LoggingInvoker;
use forgebot_service::{ForgebotService, ServiceConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServiceConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        poll_period_ms = config.poll_period_ms,
        max_chain_steps = config.max_chain_steps,
        "Loaded configuration"
    );

    let service = ForgebotService::from_config(&config)
        .await
        .unwrap_or_else(|err| panic!("failed to start forgebot service: {err}"));
    tracing::info!(
        triggers = service.catalog().triggers.len(),
        chains = service.catalog().chains.len(),
        "Ritual catalog ready"
    );

    // Ceremonies are only logged until a real handler backend is attached
    service
        .set_ceremony_handler(Arc::new(LoggingInvoker))
        .await;

    if config.start_timeline {
        service.start_timeline();
    } else {
        tracing::info!("Timeline loop disabled by configuration");
    }

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");

    service.shutdown().await;
}
