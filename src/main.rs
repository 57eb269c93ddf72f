//! Fleet agent main binary

use fleet_agent::{
    agent::{RegistrationService, RetryScheduler},
    config::AgentConfig,
    error::AgentError,
    http::HttpServer,
    master::HttpMasterClient,
    node::{MetricsPublisher, NodeMetricsService},
    registry::ServiceRegistry,
    store::{LivenessStore, ServiceMetricsStore},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fleet agent v{}", fleet_agent::AGENT_VERSION);

    // Load configuration
    let config = load_config()?;
    info!(
        agent_id = %config.agent_id,
        master_url = %config.master.base_url,
        "Configuration loaded"
    );

    // Local state
    let registry = Arc::new(ServiceRegistry::new());
    let liveness = Arc::new(LivenessStore::new());
    let samples = Arc::new(ServiceMetricsStore::new());

    // Registration path
    let master = Arc::new(HttpMasterClient::new(&config.master)?);
    let retries = RetryScheduler::new(config.retry.interval);
    let registration = RegistrationService::new(Arc::clone(&registry), master, retries);

    // Node metrics path
    let publisher = build_publisher(&config)?;
    let node_metrics = Arc::new(NodeMetricsService::new(
        Arc::clone(&liveness),
        Arc::clone(&samples),
        publisher,
    ));

    let shutdown = CancellationToken::new();
    let metrics_task = Arc::clone(&node_metrics).start(config.metrics.interval, shutdown.clone());

    // HTTP surface
    let http_server = HttpServer::new(
        registration,
        liveness,
        samples,
        Arc::clone(&node_metrics),
    );
    let app = http_server.create_router();
    let addr: std::net::SocketAddr = config.http_endpoint.parse()?;

    info!("Starting HTTP server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down fleet agent");
    shutdown.cancel();
    let _ = metrics_task.await;

    info!("Fleet agent shutdown completed");
    Ok(())
}

/// Build the metrics publisher for the configured message bus
fn build_publisher(config: &AgentConfig) -> Result<Arc<dyn MetricsPublisher>, AgentError> {
    #[cfg(feature = "kafka")]
    {
        let publisher = fleet_agent::node::KafkaPublisher::new(&config.metrics.bus)?;
        info!(
            topic = %config.metrics.bus.topic,
            "Publishing node metrics to Kafka"
        );
        Ok(Arc::new(publisher))
    }

    #[cfg(not(feature = "kafka"))]
    {
        let _ = config;
        info!("No message bus compiled in, logging node metrics instead");
        Ok(Arc::new(fleet_agent::node::LoggingPublisher))
    }
}

/// Load configuration from environment or file
fn load_config() -> Result<AgentConfig, AgentError> {
    // Try to load from environment variables first
    if let Ok(master_url) = std::env::var("FLEET_MASTER_URL") {
        let mut config = AgentConfig::default();
        config.master.base_url = master_url;
        if let Ok(agent_id) = std::env::var("FLEET_AGENT_ID") {
            config.agent_id = agent_id;
        }
        if let Ok(endpoint) = std::env::var("FLEET_HTTP_ENDPOINT") {
            config.http_endpoint = endpoint;
        }
        return Ok(config);
    }

    // Try to load from config file
    let config_path =
        std::env::var("FLEET_CONFIG_PATH").unwrap_or_else(|_| "config/agent.toml".to_string());

    if let Ok(config_content) = std::fs::read_to_string(&config_path) {
        match toml::from_str::<AgentConfig>(&config_content) {
            Ok(config) => return Ok(config),
            Err(e) => warn!("Failed to parse config file {}: {}", config_path, e),
        }
    }

    // Use default configuration
    info!("Using default configuration");
    Ok(AgentConfig::default())
}

/// Handle shutdown signals
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
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }

    info!("Shutdown signal received");
}
