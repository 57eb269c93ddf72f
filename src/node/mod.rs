//! Node-wide metrics aggregation and publishing

pub mod metrics;
pub mod publisher;

pub use metrics::NodeMetricsService;
pub use publisher::{LoggingPublisher, MetricsPublisher};

#[cfg(feature = "kafka")]
pub use publisher::KafkaPublisher;
