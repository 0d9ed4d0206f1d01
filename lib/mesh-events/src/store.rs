//! In-memory event store

use crate::options::{PublishOptions, ReadOptions, SubscribeOptions, WriteOptions};
use chrono::{DateTime, Utc};
use mesh_core::{Metadata, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, trace};

/// A recorded event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, opts: PublishOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            timestamp: opts.timestamp.unwrap_or_else(Utc::now),
            metadata: opts.metadata,
            payload: payload.into(),
        }
    }

    fn matches(&self, opts: &ReadOptions) -> bool {
        if let Some(topic) = &opts.topic {
            if &self.topic != topic {
                return false;
            }
        }
        opts.query
            .iter()
            .all(|(k, v)| self.metadata.get(k) == Some(v))
    }
}

#[derive(Clone, Debug)]
struct StoredEvent {
    event: Event,
    expires_at: Option<Instant>,
}

/// Subscribers receiving a topic's events as one unit.
///
/// A plain subscriber is a group of one; a queue group hands each event to
/// a single member, rotating between them.
#[derive(Debug)]
struct Group {
    queue: Option<String>,
    members: Vec<mpsc::UnboundedSender<Event>>,
    next: usize,
}

impl Group {
    fn deliver(&mut self, event: &Event) {
        self.members.retain(|tx| !tx.is_closed());
        if self.members.is_empty() {
            return;
        }
        let idx = self.next % self.members.len();
        self.next = idx + 1;
        if self.members[idx].send(event.clone()).is_err() {
            trace!("Subscriber went away before event {} was delivered", event.id);
        }
    }
}

/// MemoryStore keeps events in write order and delivers new writes to
/// live subscribers
pub struct MemoryStore {
    events: Arc<RwLock<Vec<StoredEvent>>>,
    subscribers: Arc<Mutex<HashMap<String, Vec<Group>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn write(&self, event: Event, opts: WriteOptions) -> Result<()> {
        let expires_at = (!opts.ttl.is_zero()).then(|| Instant::now() + opts.ttl);
        // lock order: subscribers, then events
        let mut subscribers = self.subscribers.lock().await;
        {
            let mut events = self.events.write().await;
            debug!("Stored event {} on {}", event.id, event.topic);
            events.push(StoredEvent {
                event: event.clone(),
                expires_at,
            });
        }

        if let Some(groups) = subscribers.get_mut(&event.topic) {
            for group in groups.iter_mut() {
                group.deliver(&event);
            }
            groups.retain(|g| !g.members.is_empty());
        }
        Ok(())
    }

    /// Receive events written to `topic` from now on.
    ///
    /// With `start_at` set, the backlog since then is queued first.
    /// Subscribers sharing a `queue` name split new events between them.
    pub async fn subscribe(
        &self,
        topic: &str,
        opts: SubscribeOptions,
    ) -> Result<mpsc::UnboundedReceiver<Event>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock().await;

        for event in self.replay(topic, &opts).await? {
            // rx is still held here, so the send cannot fail
            let _ = tx.send(event);
        }

        let groups = subscribers.entry(topic.to_string()).or_default();
        match &opts.queue {
            Some(queue) => match groups.iter().position(|g| g.queue.as_ref() == Some(queue)) {
                Some(idx) => groups[idx].members.push(tx),
                None => groups.push(Group {
                    queue: Some(queue.clone()),
                    members: vec![tx],
                    next: 0,
                }),
            },
            None => groups.push(Group {
                queue: None,
                members: vec![tx],
                next: 0,
            }),
        }
        debug!(topic, queue = ?opts.queue, "Subscribed");
        Ok(rx)
    }

    /// Events matching `opts`, oldest first, after `offset` and up to `limit`
    pub async fn read(&self, opts: ReadOptions) -> Result<Vec<Event>> {
        let now = Instant::now();
        let events = self.events.read().await;
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|stored| stored.expires_at.map_or(true, |at| at > now))
            .filter(|stored| stored.event.matches(&opts))
            .map(|stored| stored.event.clone())
            .collect();
        matched.sort_by_key(|e| e.timestamp);

        Ok(matched
            .into_iter()
            .skip(opts.offset)
            .take(opts.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Backlog a new subscriber on `topic` would replay
    pub async fn replay(&self, topic: &str, opts: &SubscribeOptions) -> Result<Vec<Event>> {
        let Some(start_at) = opts.start_at else {
            return Ok(Vec::new());
        };

        let events = self.read(ReadOptions::new().topic(topic)).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.timestamp >= start_at)
            .collect())
    }

    /// Drop expired events, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|stored| stored.expires_at.map_or(true, |at| at > now));
        before - events.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn event(topic: &str, secs: i64, customer: &str) -> Event {
        let mut md = Metadata::new();
        md.insert("customer".to_string(), customer.to_string());
        Event::new(
            topic,
            format!("{}@{}", topic, secs),
            PublishOptions::default().with_metadata(&md).with_timestamp(at(secs)),
        )
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..10 {
            let customer = if i % 2 == 0 { "even" } else { "odd" };
            store.write(event("orders", i, customer), WriteOptions::default()).await.unwrap();
        }
        store.write(event("refunds", 3, "even"), WriteOptions::default()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_read_applies_offset_then_limit() {
        let store = seeded().await;
        let page = store
            .read(ReadOptions::new().topic("orders").offset(2).limit(3))
            .await
            .unwrap();
        let stamps: Vec<DateTime<Utc>> = page.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![at(2), at(3), at(4)]);
    }

    #[tokio::test]
    async fn test_read_filters_by_query() {
        let store = seeded().await;
        let odd = store
            .read(ReadOptions::new().filter("customer", "odd"))
            .await
            .unwrap();
        assert_eq!(odd.len(), 5);
        assert!(odd.iter().all(|e| e.topic == "orders"));

        let all_topics = store.read(ReadOptions::new()).await.unwrap();
        assert_eq!(all_topics.len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_hides_and_purges_events() {
        let store = MemoryStore::new();
        store
            .write(event("orders", 0, "a"), WriteOptions::default().with_ttl(Duration::from_secs(5)))
            .await
            .unwrap();
        store.write(event("orders", 1, "b"), WriteOptions::default()).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.read(ReadOptions::new()).await.unwrap().len(), 1);
        assert_eq!(store.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn test_replay_from_start_time() {
        let store = seeded().await;
        let backlog = store
            .replay("orders", &SubscribeOptions::default().with_start_at(at(7)))
            .await
            .unwrap();
        assert_eq!(backlog.len(), 3);

        let none = store
            .replay("orders", &SubscribeOptions::default().with_queue("workers"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<String> {
        let mut bodies = Vec::new();
        while let Ok(event) = rx.try_recv() {
            bodies.push(String::from_utf8(event.payload).unwrap());
        }
        bodies
    }

    #[tokio::test]
    async fn test_queue_group_splits_events() {
        let store = MemoryStore::new();
        let queued = || SubscribeOptions::default().with_queue("workers");
        let mut a = store.subscribe("orders", queued()).await.unwrap();
        let mut b = store.subscribe("orders", queued()).await.unwrap();
        let mut all = store.subscribe("orders", SubscribeOptions::default()).await.unwrap();

        for i in 0..4 {
            store.write(event("orders", i, "x"), WriteOptions::default()).await.unwrap();
        }
        store.write(event("refunds", 9, "x"), WriteOptions::default()).await.unwrap();

        assert_eq!(drain(&mut a), vec!["orders@0", "orders@2"]);
        assert_eq!(drain(&mut b), vec!["orders@1", "orders@3"]);
        assert_eq!(drain(&mut all).len(), 4);
    }

    #[tokio::test]
    async fn test_queue_group_skips_departed_member() {
        let store = MemoryStore::new();
        let queued = || SubscribeOptions::default().with_queue("workers");
        let a = store.subscribe("orders", queued()).await.unwrap();
        let mut b = store.subscribe("orders", queued()).await.unwrap();
        drop(a);

        for i in 0..3 {
            store.write(event("orders", i, "x"), WriteOptions::default()).await.unwrap();
        }
        assert_eq!(drain(&mut b), vec!["orders@0", "orders@1", "orders@2"]);
    }

    #[tokio::test]
    async fn test_subscribe_replays_backlog_first() {
        let store = seeded().await;
        let mut rx = store
            .subscribe("orders", SubscribeOptions::default().with_start_at(at(8)))
            .await
            .unwrap();
        store.write(event("orders", 20, "x"), WriteOptions::default()).await.unwrap();

        assert_eq!(drain(&mut rx), vec!["orders@8", "orders@9", "orders@20"]);
    }

    #[test]
    fn test_event_defaults_timestamp_and_id() {
        let a = Event::new("t", b"x".to_vec(), PublishOptions::default());
        let b = Event::new("t", b"x".to_vec(), PublishOptions::default());
        assert_ne!(a.id, b.id);
        assert!(a.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serializes() {
        let e = event("orders", 1, "a");
        let json = serde_json::to_string(&e).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
