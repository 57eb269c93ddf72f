//! Outbound publishing of node metrics summaries.
//!
//! Publishing is fire-and-forget: the aggregation cycle never waits for
//! delivery confirmation, and delivery failures stay the bus client's
//! concern.

use crate::error::AgentError;
use crate::types::NodeMetrics;
use crate::AgentResult;
use async_trait::async_trait;
use tracing::info;

#[cfg(feature = "kafka")]
use crate::config::BusConfig;
#[cfg(feature = "kafka")]
use rdkafka::producer::{FutureProducer, FutureRecord};
#[cfg(feature = "kafka")]
use rdkafka::ClientConfig;
#[cfg(feature = "kafka")]
use tracing::warn;

/// Sink for node metrics summaries
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    /// Hand one summary to the bus; must not block on delivery
    async fn publish(&self, summary: &NodeMetrics) -> AgentResult<()>;
}

/// Fallback sink used when no message bus is compiled in; emits the summary
/// to the log stream instead.
pub struct LoggingPublisher;

#[async_trait]
impl MetricsPublisher for LoggingPublisher {
    async fn publish(&self, summary: &NodeMetrics) -> AgentResult<()> {
        info!(
            node_id = %summary.node_id,
            total = summary.total_services,
            active = summary.active_services,
            inactive = summary.inactive_services,
            avg_system_load = summary.aggregated.avg_system_load,
            "node metrics summary"
        );
        Ok(())
    }
}

/// Kafka-backed publisher sending summaries to a fixed topic
#[cfg(feature = "kafka")]
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

#[cfg(feature = "kafka")]
impl KafkaPublisher {
    /// Create a producer for the configured brokers
    pub fn new(config: &BusConfig) -> AgentResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers.join(","))
            .set("client.id", &config.client_id)
            .create()
            .map_err(|e| AgentError::Configuration(format!("Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl MetricsPublisher for KafkaPublisher {
    async fn publish(&self, summary: &NodeMetrics) -> AgentResult<()> {
        let payload = serde_json::to_vec(summary)?;
        let record = FutureRecord::to(&self.topic)
            .key(&summary.node_id)
            .payload(&payload);

        // Enqueue only; delivery is observed on a detached task so the
        // aggregation cycle never blocks on the broker.
        match self.producer.send_result(record) {
            Ok(delivery) => {
                tokio::spawn(async move {
                    match delivery.await {
                        Ok(Ok(_)) => {}
                        Ok(Err((err, _msg))) => {
                            warn!(error = %err, "node metrics delivery failed")
                        }
                        Err(_) => warn!("node metrics delivery cancelled"),
                    }
                });
                Ok(())
            }
            Err((err, _record)) => Err(AgentError::Publish(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregatedMetrics;

    #[tokio::test]
    async fn logging_publisher_accepts_any_summary() {
        let summary = NodeMetrics {
            node_id: "node-0001".to_string(),
            node_ip: None,
            total_services: 0,
            active_services: 0,
            inactive_services: 0,
            aggregated: AggregatedMetrics {
                avg_system_load: 0.0,
                avg_process_cpu_load: 0.0,
                total_used_memory_mb: 0,
                total_free_memory_mb: 0,
                total_threads: 0,
            },
        };

        assert!(LoggingPublisher.publish(&summary).await.is_ok());
    }
}
