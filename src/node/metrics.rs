//! Node-wide metrics aggregation.
//!
//! Folds the current liveness and per-service metrics snapshots into one
//! `NodeMetrics` summary per cycle, caches the latest summary for
//! synchronous retrieval and forwards it to the configured publisher.

use crate::node::publisher::MetricsPublisher;
use crate::store::{LivenessStore, ServiceMetricsStore};
use crate::types::{AggregatedMetrics, NodeMetrics, ServiceMetrics};
use rand::Rng;
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Aggregates node-level service counts and resource metrics
pub struct NodeMetricsService {
    /// Random label generated once, stable for the process lifetime
    node_id: String,
    liveness: Arc<LivenessStore>,
    samples: Arc<ServiceMetricsStore>,
    publisher: Arc<dyn MetricsPublisher>,
    /// Latest summary, swapped wholesale each cycle
    latest: RwLock<Option<Arc<NodeMetrics>>>,
}

impl NodeMetricsService {
    /// Create an aggregator over the given stores and publisher
    pub fn new(
        liveness: Arc<LivenessStore>,
        samples: Arc<ServiceMetricsStore>,
        publisher: Arc<dyn MetricsPublisher>,
    ) -> Self {
        Self {
            node_id: generate_node_id(),
            liveness,
            samples,
            publisher,
            latest: RwLock::new(None),
        }
    }

    /// Process-lifetime-stable node label
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Compute a summary over the current snapshots and cache it as latest.
    ///
    /// Never fails: an empty service set yields zeroed counts and means, and
    /// a failed IP resolution yields a summary without an IP.
    pub async fn compute_summary(&self) -> Arc<NodeMetrics> {
        let statuses = self.liveness.all_statuses();
        let total_services = statuses.len() as u64;
        let active_services = statuses.values().filter(|s| s.is_up()).count() as u64;
        let inactive_services = total_services - active_services;

        let aggregated = aggregate(&self.samples.all_samples());

        let node_ip = resolve_node_ip();
        if node_ip.is_none() {
            warn!("could not resolve node IP, emitting summary without it");
        }

        let summary = Arc::new(NodeMetrics {
            node_id: self.node_id.clone(),
            node_ip,
            total_services,
            active_services,
            inactive_services,
            aggregated,
        });

        {
            let mut latest = self.latest.write().await;
            *latest = Some(Arc::clone(&summary));
        }

        summary
    }

    /// Latest cached summary, if a cycle has run
    pub async fn latest(&self) -> Option<Arc<NodeMetrics>> {
        self.latest.read().await.clone()
    }

    /// Run one aggregation cycle and hand the result to the publisher.
    ///
    /// A publish failure is logged and does not fail the cycle; the summary
    /// is already cached by then.
    pub async fn update_and_publish(&self) {
        let summary = self.compute_summary().await;
        if let Err(e) = self.publisher.publish(&summary).await {
            warn!(error = %e, "failed to publish node metrics");
        }
    }

    /// Start the periodic aggregation driver
    pub fn start(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(node_id = %self.node_id, ?interval, "starting node metrics aggregation");

        let service = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => service.update_and_publish().await,
                }
            }
        })
    }
}

/// Fold all samples into one aggregate block; means are 0.0 on an empty set
fn aggregate(samples: &HashMap<String, ServiceMetrics>) -> AggregatedMetrics {
    let count = samples.len();

    let (avg_system_load, avg_process_cpu_load) = if count == 0 {
        (0.0, 0.0)
    } else {
        (
            samples.values().map(|m| m.system_load).sum::<f64>() / count as f64,
            samples.values().map(|m| m.process_cpu_load).sum::<f64>() / count as f64,
        )
    };

    AggregatedMetrics {
        avg_system_load,
        avg_process_cpu_load,
        total_used_memory_mb: samples.values().map(|m| m.used_memory_mb).sum(),
        total_free_memory_mb: samples.values().map(|m| m.free_memory_mb).sum(),
        total_threads: samples.values().map(|m| m.total_threads as u64).sum(),
    }
}

fn generate_node_id() -> String {
    format!("node-{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Best-effort resolution of the node's outbound IP.
///
/// Connecting a UDP socket performs no traffic; it only asks the OS which
/// local address would be used for the route.
fn resolve_node_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::publisher::MetricsPublisher;
    use crate::types::LivenessStatus;
    use crate::AgentResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingPublisher {
        published: Mutex<Vec<NodeMetrics>>,
    }

    impl RecordingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MetricsPublisher for RecordingPublisher {
        async fn publish(&self, summary: &NodeMetrics) -> AgentResult<()> {
            self.published.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    fn sample(system_load: f64) -> ServiceMetrics {
        ServiceMetrics {
            system_load,
            process_cpu_load: system_load / 2.0,
            used_memory_mb: 256,
            free_memory_mb: 768,
            total_threads: 40,
        }
    }

    fn service() -> (Arc<LivenessStore>, Arc<ServiceMetricsStore>, Arc<NodeMetricsService>) {
        let liveness = Arc::new(LivenessStore::new());
        let samples = Arc::new(ServiceMetricsStore::new());
        let service = Arc::new(NodeMetricsService::new(
            Arc::clone(&liveness),
            Arc::clone(&samples),
            RecordingPublisher::new(),
        ));
        (liveness, samples, service)
    }

    #[tokio::test]
    async fn empty_service_set_yields_zeroed_summary() {
        let (_liveness, _samples, service) = service();

        let summary = service.compute_summary().await;

        assert_eq!(summary.total_services, 0);
        assert_eq!(summary.active_services, 0);
        assert_eq!(summary.inactive_services, 0);
        assert_eq!(summary.aggregated.avg_system_load, 0.0);
        assert_eq!(summary.aggregated.avg_process_cpu_load, 0.0);
        assert_eq!(summary.aggregated.total_used_memory_mb, 0);
        assert_eq!(summary.aggregated.total_threads, 0);
    }

    #[tokio::test]
    async fn aggregates_three_active_services() {
        let (liveness, samples, service) = service();

        for (id, load) in [("svc-a", 0.2), ("svc-b", 0.4), ("svc-c", 0.6)] {
            liveness.update(id, LivenessStatus::up());
            samples.record(id, sample(load));
        }

        let summary = service.compute_summary().await;

        assert_eq!(summary.total_services, 3);
        assert_eq!(summary.active_services, 3);
        assert_eq!(summary.inactive_services, 0);
        assert!((summary.aggregated.avg_system_load - 0.4).abs() < 1e-9);
        assert_eq!(summary.aggregated.total_used_memory_mb, 768);
        assert_eq!(summary.aggregated.total_free_memory_mb, 2304);
        assert_eq!(summary.aggregated.total_threads, 120);
    }

    #[tokio::test]
    async fn total_always_equals_active_plus_inactive() {
        let (liveness, _samples, service) = service();

        liveness.update("svc-a", LivenessStatus::up());
        liveness.update("svc-b", LivenessStatus::down());
        liveness.update("svc-c", LivenessStatus {
            status: "STARTING".to_string(),
        });
        // Only the canonical label counts as active.
        liveness.update("svc-d", LivenessStatus {
            status: "up".to_string(),
        });

        let summary = service.compute_summary().await;

        assert_eq!(summary.total_services, 4);
        assert_eq!(summary.active_services, 1);
        assert_eq!(
            summary.total_services,
            summary.active_services + summary.inactive_services
        );
    }

    #[tokio::test]
    async fn latest_is_cached_after_a_cycle() {
        let (liveness, _samples, service) = service();

        assert!(service.latest().await.is_none());

        liveness.update("svc-a", LivenessStatus::up());
        let summary = service.compute_summary().await;

        let latest = service.latest().await.unwrap();
        assert_eq!(*latest, *summary);

        // A later cycle replaces the snapshot wholesale.
        liveness.update("svc-b", LivenessStatus::up());
        service.compute_summary().await;
        assert_eq!(service.latest().await.unwrap().total_services, 2);
    }

    #[tokio::test]
    async fn node_id_is_stable_across_cycles() {
        let (_liveness, _samples, service) = service();

        let first = service.compute_summary().await;
        let second = service.compute_summary().await;

        assert!(first.node_id.starts_with("node-"));
        assert_eq!(first.node_id, second.node_id);
        assert_eq!(service.node_id(), first.node_id);
    }

    #[tokio::test]
    async fn update_and_publish_forwards_the_summary() {
        let liveness = Arc::new(LivenessStore::new());
        let samples = Arc::new(ServiceMetricsStore::new());
        let publisher = RecordingPublisher::new();
        let service = NodeMetricsService::new(
            Arc::clone(&liveness),
            Arc::clone(&samples),
            Arc::clone(&publisher) as Arc<dyn MetricsPublisher>,
        );

        liveness.update("svc-a", LivenessStatus::up());
        service.update_and_publish().await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].total_services, 1);
    }
}
