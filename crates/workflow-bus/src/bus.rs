use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::stats::{BusStats, BusStatsInner};

/// An event delivered to subscribers. `topic` is carried on the event
/// itself so a handler subscribed to multiple topics (via separate calls)
/// can still tell them apart if it stores them in one place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Event {
    /// Topic this event was published on.
    pub topic: String,
    /// Arbitrary structured payload.
    pub payload: Value,
    /// When `publish` was called.
    pub published_at: DateTime<Utc>,
}

/// A subscriber callback. Must return promptly (the dispatch loop budget
/// is 50ms per the concurrency model) or hand long work off to its own
/// `tokio::spawn`.
pub type Handler = Arc<dyn Fn(Event) + Send + Sync>;

const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// A handle returned by [`EventBus::subscribe`]. Dropping it does *not*
/// unsubscribe (the background dispatch task keeps running so in-flight
/// events are not lost silently) — call [`Subscription::unsubscribe`]
/// explicitly to stop receiving and cancel any events already queued for
/// this subscriber.
pub struct Subscription {
    join_handle: tokio::task::JoinHandle<()>,
    stats: Arc<BusStatsInner>,
}

impl Subscription {
    /// Stop receiving events on this subscription. Synchronous: once this
    /// returns, no further invocation of the handler will start, and any
    /// events already queued for this subscriber are discarded with the
    /// task.
    pub fn unsubscribe(self) {
        self.join_handle.abort();
        self.stats.unregister_handler();
    }
}

/// In-process publish/subscribe bus. Each topic is backed by a
/// `tokio::sync::broadcast` channel: when a slow subscriber falls behind
/// the bounded capacity, the oldest unread event for that subscriber is
/// displaced and the displacement is counted in [`BusStats`].
pub struct EventBus {
    topics: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    topic_capacity: usize,
    stats: Arc<BusStatsInner>,
}

impl EventBus {
    /// Create a bus with the default per-topic queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a bus with an explicit per-topic queue capacity.
    pub fn with_capacity(topic_capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            topic_capacity,
            stats: Arc::new(BusStatsInner::default()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Event> {
        if let Some(sender) = self.topics.read().expect("topics lock poisoned").get(topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().expect("topics lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.topic_capacity).0)
            .clone()
    }

    /// Publish `payload` on `topic`. Enqueues and returns immediately; does
    /// not wait for any subscriber to process it. A topic with zero
    /// subscribers simply drops the event (there is nothing to overflow).
    pub fn publish(&self, topic: &str, payload: Value) {
        let sender = self.sender_for(topic);
        self.stats.record_publish();
        let event = Event {
            topic: topic.to_string(),
            payload,
            published_at: Utc::now(),
        };
        // `send` only errors when there are zero receivers; that is not a
        // delivery failure, it means nobody is listening yet.
        let _ = sender.send(event);
    }

    /// Subscribe `handler` to `topic`. Spawns a dedicated task that drains
    /// this subscriber's queue and invokes `handler` for each event in
    /// arrival order.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> Subscription {
        let sender = self.sender_for(topic);
        let mut receiver = sender.subscribe();
        self.stats.register_handler();
        let stats = self.stats.clone();
        let topic_name = topic.to_string();

        let join_handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        stats.record_dispatch();
                        handler(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            topic = %topic_name,
                            skipped,
                            "subscriber fell behind; oldest events were displaced"
                        );
                        stats.record_drops(skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            join_handle,
            stats: self.stats.clone(),
        }
    }

    /// Snapshot current bus statistics.
    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received2 = received.clone();

        let _sub = bus.subscribe(
            "change_analyzed",
            Arc::new(move |_event: Event| {
                received2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish("change_analyzed", serde_json::json!({"impact": "high"}));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().events_published, 1);
        assert_eq!(bus.stats().events_dispatched, 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        bus.publish("file_change", serde_json::json!({}));
        assert_eq!(bus.stats().events_published, 1);
        assert_eq!(bus.stats().events_dispatched, 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received2 = received.clone();

        let sub = bus.subscribe(
            "task_completed",
            Arc::new(move |_event: Event| {
                received2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        sub.unsubscribe();

        bus.publish("task_completed", serde_json::json!({}));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert_eq!(bus.stats().handlers_registered, 0);
    }

    #[tokio::test]
    async fn overflow_displaces_oldest_and_counts_drop() {
        let bus = EventBus::with_capacity(2);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<i64>();

        let _sub = bus.subscribe(
            "file_change",
            Arc::new(move |event: Event| {
                let _ = tx.send(event.payload["seq"].as_i64().unwrap_or(-1));
            }),
        );

        // Publish faster than the subscriber task gets scheduled, so the
        // bounded broadcast channel must displace the oldest entry.
        for seq in 0..5 {
            bus.publish("file_change", serde_json::json!({"seq": seq}));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut seen = Vec::new();
        while let Ok(seq) = rx.try_recv() {
            seen.push(seq);
        }
        assert!(!seen.is_empty());
        assert!(bus.stats().events_dropped > 0 || seen.len() < 5);
    }
}
