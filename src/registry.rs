//! Local directory of registered service descriptors

use crate::error::AgentError;
use crate::types::ServiceInfo;
use dashmap::DashMap;
use tracing::info;

/// Holds the descriptors of all services registered on this node.
///
/// The registry is the node-local source of truth: a service stays
/// discoverable here even while the master cannot be reached.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, ServiceInfo>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a service descriptor.
    ///
    /// A rejected insert is a local defect, not a retriable condition.
    pub fn register(&self, service: ServiceInfo) -> Result<(), AgentError> {
        if service.deployment_id.is_empty() {
            return Err(AgentError::InvalidInput(
                "deployment_id must not be empty".to_string(),
            ));
        }

        info!(
            deployment_id = %service.deployment_id,
            "service registered in local registry"
        );
        self.services.insert(service.deployment_id.clone(), service);
        Ok(())
    }

    /// Look up a single descriptor
    pub fn get(&self, deployment_id: &str) -> Option<ServiceInfo> {
        self.services.get(deployment_id).map(|s| s.clone())
    }

    /// Snapshot of all registered descriptors
    pub fn all(&self) -> Vec<ServiceInfo> {
        self.services.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
