//! Registration coordination between the local registry and the master.
//!
//! Local registration never involves the network: a service stays
//! discoverable on this node even while the master is down. Master
//! registration classifies failures and only hands connectivity-class
//! failures to the retry scheduler; everything else needs intervention and
//! is not retried.

use crate::agent::retry::{RetryAction, RetryScheduler};
use crate::error::AgentError;
use crate::master::MasterClient;
use crate::registry::ServiceRegistry;
use crate::types::ServiceInfo;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of one master registration attempt; drives control flow only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// The master acknowledged the registration
    Registered,

    /// The master was unreachable; a retry task now covers this deployment
    RetryScheduled,

    /// The attempt failed for a non-connectivity reason and is not retried
    Failed,
}

/// Coordinates service registration against the local registry and the master
#[derive(Clone)]
pub struct RegistrationService {
    inner: Arc<RegistrationInner>,
}

struct RegistrationInner {
    registry: Arc<ServiceRegistry>,
    master: Arc<dyn MasterClient>,
    retries: RetryScheduler,
}

/// Retry unit re-announcing one descriptor to the master
struct MasterRegistrationRetry {
    service: ServiceInfo,
    inner: Arc<RegistrationInner>,
}

#[async_trait]
impl RetryAction for MasterRegistrationRetry {
    async fn run(&self, _attempt: u32) {
        // Outcome handling (cancel on success, keep schedule on failure)
        // lives inside register_with_master itself.
        Arc::clone(&self.inner)
            .register_with_master(&self.service)
            .await;
    }
}

impl RegistrationService {
    /// Create a coordinator over the given registry, master client and scheduler
    pub fn new(
        registry: Arc<ServiceRegistry>,
        master: Arc<dyn MasterClient>,
        retries: RetryScheduler,
    ) -> Self {
        Self {
            inner: Arc::new(RegistrationInner {
                registry,
                master,
                retries,
            }),
        }
    }

    /// Register a service in the local registry only.
    ///
    /// A rejected insert is a local defect and is propagated, never retried.
    pub fn register_locally(&self, service: ServiceInfo) -> Result<(), AgentError> {
        self.inner.registry.register(service)
    }

    /// Announce a service to the master, classifying any failure.
    ///
    /// An unreachable master is an expected, handled condition: the
    /// descriptor is handed to the retry scheduler and no error reaches the
    /// caller.
    pub async fn register_with_master(&self, service: &ServiceInfo) -> RegistrationOutcome {
        Arc::clone(&self.inner).register_with_master(service).await
    }

    /// Snapshot of all locally registered services
    pub fn all_services(&self) -> Vec<ServiceInfo> {
        self.inner.registry.all()
    }

    /// Whether a live retry task exists for the deployment
    pub fn has_pending_retry(&self, deployment_id: &str) -> bool {
        self.inner.retries.has_pending(deployment_id)
    }

    /// Deployment ids currently covered by a retry task
    pub fn pending_retries(&self) -> Vec<String> {
        self.inner.retries.pending_ids()
    }

    /// Process-wide retry attempt count since the last successful registration
    pub fn retry_attempts(&self) -> u32 {
        self.inner.retries.attempt_count()
    }
}

impl RegistrationInner {
    async fn register_with_master(self: Arc<Self>, service: &ServiceInfo) -> RegistrationOutcome {
        match self.master.register(service).await {
            Ok(()) => {
                info!(
                    deployment_id = %service.deployment_id,
                    "service registered with master"
                );
                self.retries.mark_registered(&service.deployment_id);
                RegistrationOutcome::Registered
            }
            Err(err) if err.is_connectivity() => {
                warn!(
                    deployment_id = %service.deployment_id,
                    "master unreachable, scheduling registration retry"
                );
                let retry = MasterRegistrationRetry {
                    service: service.clone(),
                    inner: Arc::clone(&self),
                };
                self.retries.schedule(&service.deployment_id, Arc::new(retry));
                RegistrationOutcome::RetryScheduled
            }
            Err(err) => {
                error!(
                    deployment_id = %service.deployment_id,
                    error = %err,
                    "failed to register service with master"
                );
                RegistrationOutcome::Failed
            }
        }
    }
}
