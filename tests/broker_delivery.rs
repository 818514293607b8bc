//! ---
//! keel_section: "15-testing-qa"
//! keel_subsection: "integration-tests"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Integration tests for the Keel service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{stream, StreamExt};
use keel_api::{named, topic, Descriptor, Service};
use keel_broker::{ack_flow, BrokerError, BrokerMetrics, Done, InMemoryTopics, Topic, Topics};
use prometheus::Registry;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// Collects handled messages across tasks.
#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn record(&self, message: String) {
        self.0.lock().expect("recorder lock").push(message);
    }

    fn seen(&self) -> Vec<String> {
        self.0.lock().expect("recorder lock").clone()
    }
}

struct OrderService;

impl Service for OrderService {
    fn descriptor(&self) -> Descriptor {
        named("orders").with_topics([topic::<String>("order-events")])
    }
}

fn topic_for(topics: &InMemoryTopics, descriptor: &Descriptor) -> Arc<dyn Topic<String>> {
    let declared = &descriptor.topics()[0];
    assert!(declared.message_type().is::<String>());
    topics.of::<String>(declared.topic_id()).expect("topic")
}

async fn publish(topic: &Arc<dyn Topic<String>>, messages: &[&str]) {
    let messages: Vec<String> = messages.iter().map(|m| (*m).to_owned()).collect();
    let published = topic
        .publisher()
        .publish(stream::iter(messages).boxed())
        .await
        .expect("publish");
    assert!(published > 0);
}

#[tokio::test]
async fn declared_topic_delivers_to_every_group() {
    let topics = InMemoryTopics::new();
    let topic = topic_for(&topics, &OrderService.descriptor());
    publish(&topic, &["created", "paid"]).await;

    let billing = topic.subscribe().with_group_id("billing").expect("group");
    let shipping = topic.subscribe().with_group_id("shipping").expect("group");
    let billed: Vec<String> = timeout(WAIT, billing.at_most_once_source().take(2).collect())
        .await
        .expect("billing");
    let shipped: Vec<String> = timeout(WAIT, shipping.at_most_once_source().take(2).collect())
        .await
        .expect("shipping");
    assert_eq!(billed, ["created", "paid"]);
    assert_eq!(shipped, billed);
}

#[tokio::test]
async fn at_least_once_commits_after_the_flow() {
    let topics = InMemoryTopics::new();
    let topic = topic_for(&topics, &OrderService.descriptor());
    publish(&topic, &["created", "paid", "shipped"]).await;

    let recorder = Arc::new(Recorder::default());
    let sink = Arc::clone(&recorder);
    let flow = ack_flow(move |message: String| {
        let sink = Arc::clone(&sink);
        async move {
            sink.record(message);
            Ok(())
        }
    });

    let subscriber = topic.subscribe().with_group_id("audit").expect("group");
    let acked: Vec<_> = timeout(WAIT, subscriber.at_least_once_source(flow).take(2).collect())
        .await
        .expect("acked");
    assert!(acked.iter().all(|done| matches!(done, Ok(Done))));
    assert_eq!(recorder.seen(), ["created", "paid"]);

    let rest: Vec<String> = timeout(WAIT, subscriber.at_most_once_source().take(1).collect())
        .await
        .expect("remaining");
    assert_eq!(rest, ["shipped"]);
}

#[tokio::test]
async fn failed_flow_leaves_the_message_for_redelivery() {
    let topics = InMemoryTopics::new();
    let topic = topic_for(&topics, &OrderService.descriptor());
    publish(&topic, &["created"]).await;

    let subscriber = topic.subscribe().with_group_id("flaky").expect("group");
    let failing = ack_flow(|_: String| async { Err(BrokerError::handler("downstream unavailable")) });
    let outcome: Vec<_> = timeout(WAIT, subscriber.at_least_once_source(failing).collect())
        .await
        .expect("stream ends after the failure");
    assert!(matches!(outcome.as_slice(), [Err(BrokerError::Handler(_))]));

    let redelivered = timeout(WAIT, subscriber.at_most_once_source().next())
        .await
        .expect("redelivered");
    assert_eq!(redelivered.as_deref(), Some("created"));
}

#[tokio::test]
async fn topic_type_is_fixed_by_first_use() {
    let topics = InMemoryTopics::new();
    topic_for(&topics, &OrderService.descriptor());

    let err = topics
        .of::<u64>(&"order-events".into())
        .err()
        .expect("mismatch");
    assert!(matches!(err, BrokerError::MessageTypeMismatch { .. }));
    assert!(topic_ids_contain(&topics, "order-events"));
}

#[tokio::test]
async fn metrics_follow_published_and_delivered_messages() {
    let registry = Registry::new();
    let metrics = BrokerMetrics::register(&registry).expect("register");
    let topics = InMemoryTopics::new().with_metrics(metrics);
    let topic = topic_for(&topics, &OrderService.descriptor());
    publish(&topic, &["created", "paid"]).await;

    let delivered: Vec<String> = timeout(WAIT, topic.subscribe().at_most_once_source().take(2).collect())
        .await
        .expect("delivered");
    assert_eq!(delivered.len(), 2);

    let families = registry.gather();
    let published = families
        .iter()
        .find(|family| family.get_name() == "keel_broker_messages_published_total")
        .expect("published family");
    assert_eq!(published.get_metric()[0].get_counter().get_value(), 2.0);
}

#[test]
fn invalid_group_ids_are_rejected() {
    let topics = InMemoryTopics::new();
    let topic = topics.of::<String>(&"order-events".into()).expect("topic");
    let err = topic.subscribe().with_group_id("no spaces").err().expect("invalid");
    assert!(matches!(err, BrokerError::InvalidGroupId { .. }));
}

fn topic_ids_contain(topics: &InMemoryTopics, id: &str) -> bool {
    topics.topic_ids().iter().any(|topic_id| topic_id.value() == id)
}
