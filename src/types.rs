//! Core data model for the fleet agent

use serde::{Deserialize, Serialize};

/// Descriptor of a locally hosted service, immutable once registered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Unique key for this service instance
    pub deployment_id: String,

    /// Base URL the service listens on
    pub service_url: String,

    /// Context path prefix of the service
    pub context_path: String,

    /// Declared health endpoint of the service
    pub health_endpoint: String,
}

/// Liveness classification of a service, computed externally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LivenessStatus {
    /// Status label; only `LIVENESS_UP` counts as active
    pub status: String,
}

impl LivenessStatus {
    pub fn up() -> Self {
        Self {
            status: crate::LIVENESS_UP.to_string(),
        }
    }

    pub fn down() -> Self {
        Self {
            status: "DOWN".to_string(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == crate::LIVENESS_UP
    }
}

/// Last-known resource metrics of a single service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceMetrics {
    /// System load average as a fraction
    pub system_load: f64,

    /// Process CPU load as a fraction
    pub process_cpu_load: f64,

    /// Used memory in megabytes
    pub used_memory_mb: u64,

    /// Free memory in megabytes
    pub free_memory_mb: u64,

    /// Live thread count
    pub total_threads: u32,
}

/// Aggregate metrics block folded over all tracked services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedMetrics {
    /// Mean system load, 0.0 when no samples exist
    pub avg_system_load: f64,

    /// Mean process CPU load, 0.0 when no samples exist
    pub avg_process_cpu_load: f64,

    /// Summed used memory in megabytes
    pub total_used_memory_mb: u64,

    /// Summed free memory in megabytes
    pub total_free_memory_mb: u64,

    /// Summed thread count
    pub total_threads: u64,
}

/// Node-wide summary produced once per aggregation cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    /// Process-lifetime-stable node label
    pub node_id: String,

    /// Node IP resolved at summary time, absent when resolution failed
    pub node_ip: Option<String>,

    /// Count of all tracked services
    pub total_services: u64,

    /// Count of services reporting `LIVENESS_UP`
    pub active_services: u64,

    /// total_services - active_services
    pub inactive_services: u64,

    /// Aggregate metrics over the current sample set
    pub aggregated: AggregatedMetrics,
}
