//! Last-known liveness and metrics snapshots per deployment.
//!
//! Both stores are fed from outside the core (the HTTP surface ingests
//! externally computed values); the aggregator only reads them.

use crate::types::{LivenessStatus, ServiceMetrics};
use dashmap::DashMap;
use std::collections::HashMap;

/// Last-known up/down status per deployment id
#[derive(Debug, Default)]
pub struct LivenessStore {
    statuses: DashMap<String, LivenessStatus>,
}

impl LivenessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest status for a deployment
    pub fn update(&self, deployment_id: &str, status: LivenessStatus) {
        self.statuses.insert(deployment_id.to_string(), status);
    }

    /// Latest status for one deployment
    pub fn status(&self, deployment_id: &str) -> Option<LivenessStatus> {
        self.statuses.get(deployment_id).map(|s| s.clone())
    }

    /// Snapshot of all statuses
    pub fn all_statuses(&self) -> HashMap<String, LivenessStatus> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Last-known resource metrics per deployment id
#[derive(Debug, Default)]
pub struct ServiceMetricsStore {
    samples: DashMap<String, ServiceMetrics>,
}

impl ServiceMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest sample for a deployment
    pub fn record(&self, deployment_id: &str, sample: ServiceMetrics) {
        self.samples.insert(deployment_id.to_string(), sample);
    }

    /// Snapshot of all samples
    pub fn all_samples(&self) -> HashMap<String, ServiceMetrics> {
        self.samples
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
