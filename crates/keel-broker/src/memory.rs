//! ---
//! keel_section: "03-broker-contracts"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Topic contracts and the in-memory broker."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! In-process broker backed by an append-only log per topic.
//!
//! Every consumer group owns a committed offset into the log. A source
//! opened by a subscriber that never joined a group keeps its own offset,
//! starts at the head of the log, and forgets it when dropped.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use keel_common::TypeKey;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::metrics::BrokerMetrics;
use crate::publisher::Publisher;
use crate::subscriber::{AckFlow, ConsumerGroup, DeliveryMode, Done, Subscriber};
use crate::topic::{Topic, TopicId, Topics};
use crate::{BrokerError, Result};

struct RegisteredTopic {
    message_type: TypeKey,
    state: Arc<dyn Any + Send + Sync>,
}

/// Topic factory keeping every topic in memory.
#[derive(Clone, Default)]
pub struct InMemoryTopics {
    topics: Arc<Mutex<HashMap<TopicId, RegisteredTopic>>>,
    metrics: Option<BrokerMetrics>,
}

impl InMemoryTopics {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this broker reporting to `metrics`. Topics opened earlier keep
    /// the metrics they were created with.
    pub fn with_metrics(&self, metrics: BrokerMetrics) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
            metrics: Some(metrics),
        }
    }

    /// Ids of every topic opened so far.
    pub fn topic_ids(&self) -> Vec<TopicId> {
        let mut ids: Vec<_> = self.topics.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Topics for InMemoryTopics {
    fn of<M>(&self, topic_id: &TopicId) -> Result<Arc<dyn Topic<M>>>
    where
        M: Clone + Send + Sync + 'static,
    {
        let requested = TypeKey::of::<M>();
        let mut topics = self.topics.lock();
        let registered = topics.entry(topic_id.clone()).or_insert_with(|| {
            debug!(topic = %topic_id, message_type = requested.name(), "opened topic");
            RegisteredTopic {
                message_type: requested,
                state: Arc::new(TopicState::<M>::new(topic_id.clone(), self.metrics.clone())),
            }
        });

        let mismatch = || BrokerError::MessageTypeMismatch {
            topic: topic_id.clone(),
            registered: registered.message_type.name(),
            requested: requested.name(),
        };
        if registered.message_type != requested {
            return Err(mismatch());
        }
        let state = Arc::clone(&registered.state)
            .downcast::<TopicState<M>>()
            .map_err(|_| mismatch())?;
        Ok(Arc::new(InMemoryTopic { state }))
    }
}

struct TopicState<M> {
    topic_id: TopicId,
    log: RwLock<Vec<M>>,
    offsets: Mutex<HashMap<ConsumerGroup, usize>>,
    appended: Notify,
    metrics: Option<BrokerMetrics>,
}

impl<M: Clone + Send + Sync + 'static> TopicState<M> {
    fn new(topic_id: TopicId, metrics: Option<BrokerMetrics>) -> Self {
        Self {
            topic_id,
            log: RwLock::new(Vec::new()),
            offsets: Mutex::new(HashMap::new()),
            appended: Notify::new(),
            metrics,
        }
    }

    fn append(&self, message: M) {
        self.log.write().push(message);
        if let Some(metrics) = &self.metrics {
            metrics.observe_published(&self.topic_id);
        }
        self.appended.notify_waiters();
    }

    /// Claim the next message for `cursor` and commit past it in one step.
    fn claim(&self, cursor: &mut Cursor) -> Option<M> {
        let message = match cursor {
            Cursor::Group(group) => {
                let mut offsets = self.offsets.lock();
                let offset = offsets.entry(group.clone()).or_insert(0);
                let message = self.log.read().get(*offset).cloned()?;
                *offset += 1;
                message
            }
            Cursor::Private(offset) => {
                let message = self.log.read().get(*offset).cloned()?;
                *offset += 1;
                message
            }
        };
        self.observe_delivered(DeliveryMode::AtMostOnce);
        Some(message)
    }

    /// Message at the cursor's committed offset, left uncommitted.
    fn peek(&self, cursor: &Cursor) -> Option<(usize, M)> {
        let offset = match cursor {
            Cursor::Group(group) => self.offsets.lock().get(group).copied().unwrap_or(0),
            Cursor::Private(offset) => *offset,
        };
        let message = self.log.read().get(offset).cloned()?;
        Some((offset, message))
    }

    fn commit(&self, cursor: &mut Cursor, offset: usize) {
        match cursor {
            Cursor::Group(group) => {
                let mut offsets = self.offsets.lock();
                let committed = offsets.entry(group.clone()).or_insert(0);
                *committed = (*committed).max(offset + 1);
            }
            Cursor::Private(committed) => *committed = (*committed).max(offset + 1),
        }
        debug!(topic = %self.topic_id, consumer = %cursor, offset, "committed offset");
        self.observe_delivered(DeliveryMode::AtLeastOnce);
    }

    fn observe_delivered(&self, mode: DeliveryMode) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_delivered(&self.topic_id, mode);
        }
    }

    async fn next_claimed(&self, cursor: &mut Cursor) -> M {
        loop {
            let appended = self.appended.notified();
            if let Some(message) = self.claim(cursor) {
                return message;
            }
            appended.await;
        }
    }

    async fn next_uncommitted(&self, cursor: &Cursor) -> (usize, M) {
        loop {
            let appended = self.appended.notified();
            if let Some(entry) = self.peek(cursor) {
                return entry;
            }
            appended.await;
        }
    }
}

/// Where a source reads from: a shared group offset, or one owned by the
/// source itself.
enum Cursor {
    Group(ConsumerGroup),
    Private(usize),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Group(group) => write!(f, "{group}"),
            Cursor::Private(_) => f.write_str("<private>"),
        }
    }
}

struct InMemoryTopic<M> {
    state: Arc<TopicState<M>>,
}

impl<M: Clone + Send + Sync + 'static> Topic<M> for InMemoryTopic<M> {
    fn topic_id(&self) -> &TopicId {
        &self.state.topic_id
    }

    fn subscribe(&self) -> Box<dyn Subscriber<M>> {
        Box::new(InMemorySubscriber {
            state: Arc::clone(&self.state),
            group: None,
        })
    }

    fn publisher(&self) -> Arc<dyn Publisher<M>> {
        Arc::new(InMemoryPublisher {
            state: Arc::clone(&self.state),
        })
    }
}

struct InMemorySubscriber<M> {
    state: Arc<TopicState<M>>,
    group: Option<ConsumerGroup>,
}

impl<M> InMemorySubscriber<M> {
    fn cursor(&self) -> Cursor {
        match &self.group {
            Some(group) => Cursor::Group(group.clone()),
            None => Cursor::Private(0),
        }
    }
}

impl<M: Clone + Send + Sync + 'static> Subscriber<M> for InMemorySubscriber<M> {
    fn with_group_id(&self, group_id: &str) -> Result<Box<dyn Subscriber<M>>> {
        Ok(Box::new(InMemorySubscriber {
            state: Arc::clone(&self.state),
            group: Some(ConsumerGroup::new(group_id)?),
        }))
    }

    fn group(&self) -> Option<&ConsumerGroup> {
        self.group.as_ref()
    }

    fn at_most_once_source(&self) -> BoxStream<'static, M> {
        let state = Arc::clone(&self.state);
        stream::unfold((state, self.cursor()), |(state, mut cursor)| async move {
            let message = state.next_claimed(&mut cursor).await;
            Some((message, (state, cursor)))
        })
        .boxed()
    }

    fn at_least_once_source(&self, flow: AckFlow<M>) -> BoxStream<'static, Result<Done>> {
        let state = Arc::clone(&self.state);
        stream::unfold(Some((state, self.cursor(), flow)), |running| async move {
            let Some((state, mut cursor, flow)) = running else {
                return None;
            };
            let (offset, message) = state.next_uncommitted(&cursor).await;
            match flow(message).await {
                Ok(()) => {
                    state.commit(&mut cursor, offset);
                    Some((Ok(Done), Some((state, cursor, flow))))
                }
                Err(err) => {
                    warn!(
                        topic = %state.topic_id,
                        consumer = %cursor,
                        offset,
                        error = %err,
                        "acknowledgement flow failed; offset left uncommitted"
                    );
                    if let Some(metrics) = &state.metrics {
                        metrics.observe_failed(&state.topic_id);
                    }
                    Some((Err(err), None))
                }
            }
        })
        .boxed()
    }
}

struct InMemoryPublisher<M> {
    state: Arc<TopicState<M>>,
}

#[async_trait]
impl<M: Clone + Send + Sync + 'static> Publisher<M> for InMemoryPublisher<M> {
    async fn publish(&self, mut messages: BoxStream<'static, M>) -> Result<u64> {
        let mut published = 0;
        while let Some(message) = messages.next().await {
            self.state.append(message);
            published += 1;
        }
        debug!(topic = %self.state.topic_id, published, "publish stream drained");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use prometheus::Registry;
    use tokio::time::timeout;

    use super::*;
    use crate::subscriber::ack_flow;

    const WAIT: Duration = Duration::from_secs(2);

    async fn publish<M: Clone + Send + Sync + 'static>(topic: &Arc<dyn Topic<M>>, messages: Vec<M>) {
        topic
            .publisher()
            .publish(stream::iter(messages).boxed())
            .await
            .expect("publish");
    }

    #[tokio::test]
    async fn at_most_once_delivers_in_order() {
        let topics = InMemoryTopics::new();
        let topic = topics.of::<String>(&TopicId::of("greetings")).expect("topic");
        publish(&topic, vec!["a".to_owned(), "b".to_owned()]).await;

        let received: Vec<String> = timeout(WAIT, topic.subscribe().at_most_once_source().take(2).collect())
            .await
            .expect("delivered");
        assert_eq!(received, ["a", "b"]);
    }

    #[tokio::test]
    async fn subscribers_wait_for_later_messages() {
        let topics = InMemoryTopics::new();
        let topic = topics.of::<u32>(&TopicId::of("numbers")).expect("topic");
        let mut source = topic.subscribe().at_most_once_source();

        let publisher_topic = Arc::clone(&topic);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publish(&publisher_topic, vec![7]).await;
        });

        assert_eq!(timeout(WAIT, source.next()).await.expect("woken"), Some(7));
    }

    #[tokio::test]
    async fn a_group_shares_its_offset() {
        let topics = InMemoryTopics::new();
        let topic = topics.of::<u32>(&TopicId::of("jobs")).expect("topic");
        publish(&topic, vec![1, 2, 3]).await;

        let subscriber = topic.subscribe().with_group_id("workers").expect("group");
        let first: Vec<u32> = subscriber.at_most_once_source().take(2).collect().await;
        let rest: Vec<u32> = timeout(WAIT, subscriber.at_most_once_source().take(1).collect())
            .await
            .expect("delivered");
        assert_eq!(first, [1, 2]);
        assert_eq!(rest, [3]);

        let other: Vec<u32> = topic.subscribe().at_most_once_source().take(3).collect().await;
        assert_eq!(other, [1, 2, 3]);
    }

    fn tracked_groups<M: Clone + Send + Sync + 'static>(
        topics: &InMemoryTopics,
        topic_id: &TopicId,
    ) -> usize {
        let registered = topics.topics.lock();
        let state = registered
            .get(topic_id)
            .map(|topic| Arc::clone(&topic.state))
            .and_then(|state| state.downcast::<TopicState<M>>().ok())
            .expect("topic state");
        let count = state.offsets.lock().len();
        count
    }

    #[tokio::test]
    async fn ungrouped_sources_keep_their_offsets_to_themselves() {
        let topics = InMemoryTopics::new();
        let id = TopicId::of("audit");
        let topic = topics.of::<u32>(&id).expect("topic");
        publish(&topic, vec![1, 2]).await;

        for _ in 0..5 {
            let subscriber = topic.subscribe();
            let seen: Vec<u32> = timeout(WAIT, subscriber.at_most_once_source().take(2).collect())
                .await
                .expect("delivered");
            assert_eq!(seen, [1, 2]);
            let flow = ack_flow(|_: u32| async { Ok::<_, BrokerError>(()) });
            let acked = timeout(WAIT, subscriber.at_least_once_source(flow).take(2).count())
                .await
                .expect("acknowledged");
            assert_eq!(acked, 2);
        }
        assert_eq!(tracked_groups::<u32>(&topics, &id), 0);

        let grouped = topic.subscribe().with_group_id("auditors").expect("group");
        let _ = timeout(WAIT, grouped.at_most_once_source().next())
            .await
            .expect("delivered");
        assert_eq!(tracked_groups::<u32>(&topics, &id), 1);
    }

    #[tokio::test]
    async fn ungrouped_at_least_once_retries_within_the_source_only() {
        let topics = InMemoryTopics::new();
        let topic = topics.of::<u32>(&TopicId::of("retries")).expect("topic");
        publish(&topic, vec![5, 6]).await;
        let subscriber = topic.subscribe();

        let flow = ack_flow(|_: u32| async { Ok::<_, BrokerError>(()) });
        let first = timeout(WAIT, subscriber.at_least_once_source(flow).take(1).count())
            .await
            .expect("acknowledged");
        assert_eq!(first, 1);

        // A fresh source starts from the head again.
        let replayed: Vec<u32> =
            timeout(WAIT, subscriber.at_most_once_source().take(2).collect())
                .await
                .expect("delivered");
        assert_eq!(replayed, [5, 6]);
    }

    #[tokio::test]
    async fn failed_ack_flow_leaves_message_for_redelivery() {
        let topics = InMemoryTopics::new();
        let topic = topics.of::<u32>(&TopicId::of("payments")).expect("topic");
        publish(&topic, vec![10, 20]).await;
        let subscriber = topic.subscribe().with_group_id("ledger").expect("group");

        let failing = ack_flow(|n: u32| async move {
            if n == 20 {
                Err(BrokerError::handler("ledger offline"))
            } else {
                Ok(())
            }
        });
        let outcomes: Vec<Result<Done>> = timeout(WAIT, subscriber.at_least_once_source(failing).collect())
            .await
            .expect("stream ends on failure");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(BrokerError::Handler(_))));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let accepting = ack_flow(move |n: u32| {
            let counter = Arc::clone(&counter);
            async move {
                assert_eq!(n, 20);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let retried = timeout(WAIT, subscriber.at_least_once_source(accepting).next())
            .await
            .expect("redelivered");
        assert!(matches!(retried, Some(Ok(Done))));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn topics_keep_their_message_type() {
        let topics = InMemoryTopics::new();
        let id = TopicId::of("typed");
        topics.of::<u32>(&id).expect("first open");
        assert!(topics.of::<u32>(&id).is_ok());
        let err = topics.of::<String>(&id).err().expect("type mismatch");
        assert!(matches!(err, BrokerError::MessageTypeMismatch { .. }));
        assert_eq!(topics.topic_ids(), vec![id]);
    }

    #[tokio::test]
    async fn metrics_follow_publish_and_delivery() {
        let registry = Registry::new();
        let metrics = BrokerMetrics::register(&registry).expect("metrics");
        let topics = InMemoryTopics::new().with_metrics(metrics);
        let topic = topics.of::<u32>(&TopicId::of("metered")).expect("topic");
        publish(&topic, vec![1]).await;
        let _ = topic.subscribe().at_most_once_source().next().await;

        let families = registry.gather();
        let published = families
            .iter()
            .find(|f| f.get_name() == "keel_broker_messages_published_total")
            .expect("published family");
        assert_eq!(published.get_metric()[0].get_counter().get_value() as u64, 1);
    }
}
