//! ---
//! keel_section: "03-broker-contracts"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Topic contracts and the in-memory broker."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use prometheus::{IntCounterVec, Opts, Registry};

use crate::subscriber::DeliveryMode;
use crate::topic::TopicId;
use crate::Result;

/// Prometheus metric handles for broker activity.
#[derive(Clone)]
pub struct BrokerMetrics {
    published: IntCounterVec,
    delivered: IntCounterVec,
    failed: IntCounterVec,
}

impl BrokerMetrics {
    /// Register broker metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self> {
        let published = IntCounterVec::new(
            Opts::new(
                "keel_broker_messages_published_total",
                "Messages appended to a topic",
            ),
            &["topic"],
        )?;
        let delivered = IntCounterVec::new(
            Opts::new(
                "keel_broker_messages_delivered_total",
                "Messages whose offset was committed for a consumer group",
            ),
            &["topic", "mode"],
        )?;
        let failed = IntCounterVec::new(
            Opts::new(
                "keel_broker_handler_failures_total",
                "At-least-once acknowledgement flows that failed",
            ),
            &["topic"],
        )?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            published,
            delivered,
            failed,
        })
    }

    /// Record a published message.
    pub fn observe_published(&self, topic: &TopicId) {
        self.published.with_label_values(&[topic.value()]).inc();
    }

    /// Record a committed delivery.
    pub fn observe_delivered(&self, topic: &TopicId, mode: DeliveryMode) {
        self.delivered
            .with_label_values(&[topic.value(), mode.as_str()])
            .inc();
    }

    /// Record a failed acknowledgement flow.
    pub fn observe_failed(&self, topic: &TopicId) {
        self.failed.with_label_values(&[topic.value()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_record_per_topic() {
        let registry = Registry::new();
        let metrics = BrokerMetrics::register(&registry).expect("register metrics");
        let topic = TopicId::of("orders");
        metrics.observe_published(&topic);
        metrics.observe_delivered(&topic, DeliveryMode::AtLeastOnce);
        metrics.observe_failed(&topic);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "keel_broker_messages_published_total"));
        assert_eq!(
            metrics
                .delivered
                .with_label_values(&["orders", "at_least_once"])
                .get(),
            1
        );
    }

    #[test]
    fn double_registration_fails() {
        let registry = Registry::new();
        BrokerMetrics::register(&registry).expect("first registration");
        assert!(BrokerMetrics::register(&registry).is_err());
    }
}
