use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use guardian_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Topic {
    SensorAlarm,
    SensorIdle,
    AlarmsSilenced,
    ThoughtUpdated,
    AlertDispatched,
    ArchiveFailed,
    TrendUpdated,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::SensorAlarm,
        Topic::SensorIdle,
        Topic::AlarmsSilenced,
        Topic::ThoughtUpdated,
        Topic::AlertDispatched,
        Topic::ArchiveFailed,
        Topic::TrendUpdated,
    ];

    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::SensorAlarm { .. } => Topic::SensorAlarm,
            BusMessage::SensorIdle { .. } => Topic::SensorIdle,
            BusMessage::AlarmsSilenced => Topic::AlarmsSilenced,
            BusMessage::ThoughtUpdated { .. } => Topic::ThoughtUpdated,
            BusMessage::AlertDispatched { .. } => Topic::AlertDispatched,
            BusMessage::ArchiveFailed { .. } => Topic::ArchiveFailed,
            BusMessage::TrendUpdated { .. } => Topic::TrendUpdated,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

/// Fan-out of UI intents to whoever renders them.
///
/// Delivery is best effort: a full subscriber queue drops the message, the
/// publisher never waits on a slow renderer.
pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    /// Subscribe one receiver to every topic.
    pub async fn subscribe_all(&self) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        for topic in Topic::ALL {
            subs.entry(topic).or_default().push(tx.clone());
        }
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }
}

async fn deliver(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let subs = subscribers.read().await;
    if let Some(list) = subs.get(&topic) {
        for tx in list {
            if tx.try_send(msg.clone()).is_err() {
                tracing::debug!(?topic, "bus subscriber full or closed, message dropped");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use guardian_schema::SensorChannel;
    use tokio::time::{timeout, Duration};
    use uuid::Uuid;

    fn alarm_message() -> BusMessage {
        BusMessage::SensorAlarm {
            trace_id: Uuid::new_v4(),
            channel: SensorChannel::Fire,
            label: "CRITICAL".to_string(),
            confidence: 100,
        }
    }

    #[tokio::test]
    async fn publish_to_no_subscribers_succeeds() {
        let bus = EventBus::new(8);
        let result = bus.publish(BusMessage::AlarmsSilenced).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::SensorAlarm).await;

        bus.publish(alarm_message()).await.unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, BusMessage::SensorAlarm { .. }));
    }

    #[tokio::test]
    async fn different_topics_no_crosstalk() {
        let bus = EventBus::new(8);
        let mut alarm_rx = bus.subscribe(Topic::SensorAlarm).await;

        bus.publish(BusMessage::TrendUpdated {
            points: vec![0; 20],
            at: Utc::now(),
        })
        .await
        .unwrap();

        let received = timeout(Duration::from_millis(50), alarm_rx.recv()).await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn subscribe_all_receives_every_topic() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_all().await;

        bus.publish(alarm_message()).await.unwrap();
        bus.publish(BusMessage::AlarmsSilenced).await.unwrap();

        let first = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, BusMessage::SensorAlarm { .. }));
        assert!(matches!(second, BusMessage::AlarmsSilenced));
    }

    #[tokio::test]
    async fn bus_publisher_clone_works() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::SensorAlarm).await;
        let publisher = bus.publisher().clone();

        publisher.publish(alarm_message()).await.unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, BusMessage::SensorAlarm { .. }));
    }

    #[tokio::test]
    async fn channel_backpressure_drops_when_full() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe(Topic::SensorAlarm).await;

        bus.publish(alarm_message()).await.unwrap();
        bus.publish(alarm_message()).await.unwrap();

        let first = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(first.is_ok());

        let second = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }

    #[test]
    fn topic_from_message_covers_all_variants() {
        let trace_id = Uuid::new_v4();
        let cases: Vec<(BusMessage, Topic)> = vec![
            (alarm_message(), Topic::SensorAlarm),
            (
                BusMessage::SensorIdle {
                    channel: SensorChannel::Laser,
                    label: "SECURE".into(),
                },
                Topic::SensorIdle,
            ),
            (BusMessage::AlarmsSilenced, Topic::AlarmsSilenced),
            (
                BusMessage::ThoughtUpdated {
                    trace_id,
                    text: "t".into(),
                },
                Topic::ThoughtUpdated,
            ),
            (
                BusMessage::ArchiveFailed {
                    trace_id,
                    error: "e".into(),
                },
                Topic::ArchiveFailed,
            ),
            (
                BusMessage::TrendUpdated {
                    points: vec![],
                    at: Utc::now(),
                },
                Topic::TrendUpdated,
            ),
        ];

        for (msg, expected_topic) in cases {
            assert_eq!(Topic::from_message(&msg), expected_topic);
        }
    }
}
