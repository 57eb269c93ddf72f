//! Configuration for the fleet agent

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the fleet agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent identifier
    pub agent_id: String,

    /// HTTP endpoint the agent listens on
    pub http_endpoint: String,

    /// Master coordination settings
    pub master: MasterConfig,

    /// Registration retry settings
    pub retry: RetryConfig,

    /// Node metrics settings
    pub metrics: MetricsConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: uuid::Uuid::new_v4().to_string(),
            http_endpoint: crate::DEFAULT_HTTP_ENDPOINT.to_string(),
            master: MasterConfig::default(),
            retry: RetryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Master coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Base URL of the master service
    pub base_url: String,

    /// Request timeout for master calls
    pub request_timeout: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Registration retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Fixed period between retry firings, also used as the initial delay
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

/// Node metrics aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Fixed period between aggregation cycles
    pub interval: Duration,

    /// Message bus settings
    pub bus: BusConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::DEFAULT_METRICS_INTERVAL_SECS),
            bus: BusConfig::default(),
        }
    }
}

/// Message bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Kafka bootstrap servers
    pub bootstrap_servers: Vec<String>,

    /// Topic node metrics summaries are published to
    pub topic: String,

    /// Producer client ID
    pub client_id: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            topic: crate::NODE_METRICS_TOPIC.to_string(),
            client_id: "fleet-agent".to_string(),
        }
    }
}
