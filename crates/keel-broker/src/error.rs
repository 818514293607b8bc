//! ---
//! keel_section: "03-broker-contracts"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Topic contracts and the in-memory broker."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fmt;

use crate::topic::TopicId;

/// Failures raised by topics, subscribers, and publishers.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The consumer group id is not usable.
    #[error("invalid consumer group id `{group_id}`: {reason}")]
    InvalidGroupId {
        /// Rejected id.
        group_id: String,
        /// Which rule it broke.
        reason: &'static str,
    },
    /// A topic was requested with a different message type than it carries.
    #[error("topic `{topic}` carries `{registered}`, requested as `{requested}`")]
    MessageTypeMismatch {
        /// Topic in question.
        topic: TopicId,
        /// Message type the topic was first opened with.
        registered: &'static str,
        /// Message type of the failing request.
        requested: &'static str,
    },
    /// An at-least-once acknowledgement flow failed.
    #[error("message handler failed: {0}")]
    Handler(String),
    /// Metric registration failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl BrokerError {
    /// Wrap a handler failure so that it can be returned from an ack flow.
    pub fn handler(reason: impl fmt::Display) -> Self {
        Self::Handler(reason.to_string())
    }
}
