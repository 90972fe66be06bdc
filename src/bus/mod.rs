// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The event bus (C2): subject-keyed pub/sub over [`crate::types::Event`].
//!
//! A handler is anything implementing [`pubserve::Subscriber<Event>`]:
//! `async fn update(&self, event: &Event)`. On top of that shape this
//! module adds subject routing with wildcards, queue-group competing
//! consumers, and a bounded drop-oldest mailbox per subscriber so a slow
//! handler cannot make `publish` block.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::warn;
use pubserve::Subscriber;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

pub use subject::SubjectPattern;

use crate::types::utils::Ulid;
use crate::types::Event;

pub mod subject;

/// Anything that can receive bus events.
pub type Handler = Arc<dyn Subscriber<Event> + Send + Sync>;

/// Per-subscriber mailbox: bounded, drop-oldest when full.
struct Mailbox {
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    capacity: usize,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
        }
    }

    async fn push(&self, event: Event) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Event {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(event) = queue.pop_front() {
                    return event;
                }
            }
            self.notify.notified().await;
        }
    }

    async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

struct Subscription {
    id: Ulid,
    pattern: SubjectPattern,
    group: Option<String>,
    mailbox: Arc<Mailbox>,
    task: JoinHandle<()>,
}

/// Default bounded mailbox depth per subscriber.
const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// The event bus. Cheap to clone: internally an `Arc`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    subscriptions: RwLock<Vec<Subscription>>,
    queue_cursors: Mutex<HashMap<String, usize>>,
    inflight: AtomicUsize,
    drained: Notify,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscriptions: RwLock::new(Vec::new()),
                queue_cursors: Mutex::new(HashMap::new()),
                inflight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Broadcast subscribe: every subscriber sees every matching message.
    pub async fn subscribe(&self, subject: &str, handler: Handler) -> Ulid {
        self.add_subscription(subject, None, handler).await
    }

    /// Competing-consumers subscribe: exactly one handler in `group`
    /// receives each matching message.
    pub async fn queue_subscribe(&self, subject: &str, group: &str, handler: Handler) -> Ulid {
        self.add_subscription(subject, Some(group.to_string()), handler)
            .await
    }

    async fn add_subscription(
        &self,
        subject: &str,
        group: Option<String>,
        handler: Handler,
    ) -> Ulid {
        let id = Ulid::generate();
        let mailbox = Arc::new(Mailbox::new(DEFAULT_MAILBOX_CAPACITY));
        let task_mailbox = mailbox.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = task_mailbox.pop().await;
                handler.update(&event).await;
            }
        });
        let subscription = Subscription {
            id,
            pattern: SubjectPattern::parse(subject),
            group,
            mailbox,
            task,
        };
        self.inner.subscriptions.write().await.push(subscription);
        id
    }

    pub async fn unsubscribe(&self, id: Ulid) {
        let mut subs = self.inner.subscriptions.write().await;
        if let Some(pos) = subs.iter().position(|s| s.id == id) {
            let sub = subs.remove(pos);
            sub.task.abort();
        }
    }

    /// Delivers `event` under `subject` to every matching broadcast
    /// subscriber and to one subscriber per matching queue group.
    /// Never awaits handler execution: it only pushes onto each matching
    /// subscriber's mailbox, which is non-blocking.
    pub async fn publish(&self, subject: &str, event: Event) {
        self.inner.inflight.fetch_add(1, Ordering::SeqCst);

        let subs = self.inner.subscriptions.read().await;
        let matching: Vec<&Subscription> = subs
            .iter()
            .filter(|s| s.pattern.matches(subject))
            .collect();

        let mut by_group: HashMap<&str, Vec<&Subscription>> = HashMap::new();
        for sub in &matching {
            match &sub.group {
                None => sub.mailbox.push(event.clone()).await,
                Some(group) => by_group.entry(group.as_str()).or_default().push(sub),
            }
        }

        if !by_group.is_empty() {
            let mut cursors = self.inner.queue_cursors.lock().await;
            for (group, members) in by_group {
                if members.is_empty() {
                    continue;
                }
                let cursor = cursors.entry(group.to_string()).or_insert(0);
                let chosen = &members[*cursor % members.len()];
                *cursor = cursor.wrapping_add(1);
                chosen.mailbox.push(event.clone()).await;
            }
        }

        drop(subs);
        if self.inner.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }

    /// Flushes in-flight deliveries: waits for every subscriber mailbox to
    /// drain, then tears down subscriber tasks. No new subscriptions or
    /// publishes are expected after this returns.
    pub async fn close(&self) {
        while self.inner.inflight.load(Ordering::SeqCst) > 0 {
            self.inner.drained.notified().await;
        }

        let mut subs = self.inner.subscriptions.write().await;
        for sub in subs.iter() {
            let mut spins = 0;
            while !sub.mailbox.is_empty().await && spins < 10_000 {
                tokio::task::yield_now().await;
                spins += 1;
            }
            if spins >= 10_000 {
                warn!("bus subscriber {} did not drain before close", sub.id);
            }
        }
        for sub in subs.drain(..) {
            sub.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    struct CountingHandler {
        count: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl Subscriber<Event> for CountingHandler {
        async fn update(&self, _event: &Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(subject: &str) -> Event {
        Event::new(subject, "test", json!({}))
    }

    #[tokio::test]
    async fn broadcast_reaches_all_matching_subscribers() {
        let bus = EventBus::new();
        let count_a = Arc::new(StdAtomicUsize::new(0));
        let count_b = Arc::new(StdAtomicUsize::new(0));
        bus.subscribe(
            "amityvox.message.>",
            Arc::new(CountingHandler { count: count_a.clone() }),
        )
        .await;
        bus.subscribe(
            "amityvox.guild.>",
            Arc::new(CountingHandler { count: count_b.clone() }),
        )
        .await;

        bus.publish("amityvox.message.create", event("amityvox.message.create"))
            .await;
        bus.close().await;

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn queue_group_delivers_to_exactly_one_member() {
        let bus = EventBus::new();
        let count_a = Arc::new(StdAtomicUsize::new(0));
        let count_b = Arc::new(StdAtomicUsize::new(0));
        bus.queue_subscribe(
            "amityvox.webhook.dispatch",
            "webhook-workers",
            Arc::new(CountingHandler { count: count_a.clone() }),
        )
        .await;
        bus.queue_subscribe(
            "amityvox.webhook.dispatch",
            "webhook-workers",
            Arc::new(CountingHandler { count: count_b.clone() }),
        )
        .await;

        for _ in 0..4 {
            bus.publish(
                "amityvox.webhook.dispatch",
                event("amityvox.webhook.dispatch"),
            )
            .await;
        }
        bus.close().await;

        let total = count_a.load(Ordering::SeqCst) + count_b.load(Ordering::SeqCst);
        assert_eq!(total, 4);
        // round-robin cursor means both members get a turn across 4 messages
        assert_eq!(count_a.load(Ordering::SeqCst), 2);
        assert_eq!(count_b.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_deliveries() {
        let bus = EventBus::new();
        let count = Arc::new(StdAtomicUsize::new(0));
        let id = bus
            .subscribe("amityvox.message.create", Arc::new(CountingHandler { count: count.clone() }))
            .await;
        bus.unsubscribe(id).await;
        bus.publish("amityvox.message.create", event("amityvox.message.create"))
            .await;
        bus.close().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
