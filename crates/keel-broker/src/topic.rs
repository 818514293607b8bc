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
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::Result;

/// Name of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Topic id with the given value.
    pub fn of(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw topic name.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(value: &str) -> Self {
        Self::of(value)
    }
}

/// A named channel with independent publish and subscribe sides.
pub trait Topic<M: Send + 'static>: Send + Sync {
    /// Identifier of this topic.
    fn topic_id(&self) -> &TopicId;

    /// Fresh subscriber without a consumer group.
    fn subscribe(&self) -> Box<dyn Subscriber<M>>;

    /// Publisher writing into this topic.
    fn publisher(&self) -> Arc<dyn Publisher<M>>;
}

/// Factory for topic handles. The message type doubles as the type token the
/// broker uses to pick a serializer.
pub trait Topics: Send + Sync {
    /// Open `topic_id` carrying messages of type `M`.
    fn of<M>(&self, topic_id: &TopicId) -> Result<Arc<dyn Topic<M>>>
    where
        M: Clone + Send + Sync + 'static;
}
