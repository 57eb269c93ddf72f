//! Fleet Agent - node-local service registration and metrics agent

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod master;
pub mod node;
pub mod registry;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use agent::{RegistrationOutcome, RegistrationService, RetryScheduler};
pub use config::AgentConfig;
pub use error::AgentError;
pub use node::NodeMetricsService;
pub use registry::ServiceRegistry;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent version
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent name
pub const AGENT_NAME: &str = "fleet-agent";

/// Default HTTP endpoint
pub const DEFAULT_HTTP_ENDPOINT: &str = "0.0.0.0:8082";

/// Registration path on the master, relative to its base URL
pub const MASTER_REGISTER_PATH: &str = "/master/api/v1/services/register";

/// Message bus topic node metrics summaries are published to
pub const NODE_METRICS_TOPIC: &str = "node-metrics-topic";

/// Canonical liveness label counting a service as active
pub const LIVENESS_UP: &str = "UP";

/// Default period between registration retry firings in seconds
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;

/// Default period between node metrics aggregation cycles in seconds
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 60;
