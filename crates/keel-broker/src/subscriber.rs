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
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::{BrokerError, Result};

const MAX_GROUP_ID_LEN: usize = 249;

/// Consumer group shared by subscribers that split a topic between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsumerGroup(String);

impl ConsumerGroup {
    /// Validate and wrap a group id.
    ///
    /// Ids must be non-empty, at most 249 characters, and made of ASCII
    /// letters, digits, `.`, `_` or `-`.
    pub fn new(group_id: impl Into<String>) -> Result<Self> {
        let group_id = group_id.into();
        let reason = if group_id.is_empty() {
            Some("must not be empty")
        } else if group_id.len() > MAX_GROUP_ID_LEN {
            Some("must be at most 249 characters")
        } else if matches!(group_id.as_str(), "." | "..") {
            Some("must not be `.` or `..`")
        } else if !group_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            Some("may only contain ASCII alphanumerics, `.`, `_` and `-`")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(BrokerError::InvalidGroupId { group_id, reason }),
            None => Ok(Self(group_id)),
        }
    }

    /// The group id.
    pub fn group_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConsumerGroup {
    type Error = BrokerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ConsumerGroup> for String {
    fn from(group: ConsumerGroup) -> Self {
        group.0
    }
}

/// Delivery mode selected when a subscription stream is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Offset committed before the message is handed out.
    AtMostOnce,
    /// Offset committed after the acknowledgement flow succeeded.
    AtLeastOnce,
}

impl DeliveryMode {
    /// Metric label for the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::AtMostOnce => "at_most_once",
            DeliveryMode::AtLeastOnce => "at_least_once",
        }
    }
}

/// Marker emitted by at-least-once streams once a message was committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Done;

/// Acknowledgement flow run for every message of an at-least-once stream.
pub type AckFlow<M> = Arc<dyn Fn(M) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Build an [`AckFlow`] from an async closure.
pub fn ack_flow<M, F, Fut>(handler: F) -> AckFlow<M>
where
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |message| handler(message).boxed())
}

/// Subscribe side of a topic.
///
/// Sources are restartable: every call opens a new, potentially infinite
/// stream positioned at the group's committed offset. Dropping the stream
/// cancels the subscription.
pub trait Subscriber<M: Send + 'static>: Send + Sync {
    /// Copy of this subscriber joined to `group_id`.
    fn with_group_id(&self, group_id: &str) -> Result<Box<dyn Subscriber<M>>>;

    /// Consumer group, if one was joined.
    fn group(&self) -> Option<&ConsumerGroup>;

    /// Messages committed as they are handed out.
    fn at_most_once_source(&self) -> BoxStream<'static, M>;

    /// One [`Done`] per message whose `flow` succeeded. The stream ends with
    /// the flow's error if it fails, leaving that message uncommitted.
    fn at_least_once_source(&self, flow: AckFlow<M>) -> BoxStream<'static, Result<Done>>;
}
