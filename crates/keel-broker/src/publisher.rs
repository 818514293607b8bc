//! ---
//! keel_section: "03-broker-contracts"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Topic contracts and the in-memory broker."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;

/// Publish side of a topic.
#[async_trait]
pub trait Publisher<M: Send + 'static>: Send + Sync {
    /// Drain `messages` into the topic, returning how many were published.
    async fn publish(&self, messages: BoxStream<'static, M>) -> Result<u64>;
}
