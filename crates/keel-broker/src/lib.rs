//! ---
//! keel_section: "03-broker-contracts"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Topic contracts and the in-memory broker."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Minimal pub/sub contracts used by Keel service descriptors.
//!
//! A [`Topic`] exposes a [`Publisher`] sink and a [`Subscriber`] source. The
//! subscriber chooses its delivery mode when the stream is created:
//! at-most-once commits before handing a message out, at-least-once commits
//! only after the caller's acknowledgement flow succeeds.
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod metrics;
pub mod publisher;
pub mod subscriber;
pub mod topic;

pub use error::BrokerError;
pub use memory::InMemoryTopics;
pub use metrics::BrokerMetrics;
pub use publisher::Publisher;
pub use subscriber::{ack_flow, AckFlow, ConsumerGroup, DeliveryMode, Done, Subscriber};
pub use topic::{Topic, TopicId, Topics};

/// Shared result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
