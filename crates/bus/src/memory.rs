//! In-process bus with NATS-style queue groups
//!
//! Each group member runs as its own task fed by an unbounded channel.
//! Deliveries are routed round-robin across the members of a group.

use crate::error::BusError;
use crate::message::{EventBus, Message};
use crate::subscriber::EventSubscriber;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Redelivery policy for unacknowledged messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Wait before an unacknowledged message is delivered again
    pub redelivery_delay: Duration,
    /// Total delivery attempts before a message is dropped
    pub max_deliveries: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            redelivery_delay: Duration::from_millis(500),
            max_deliveries: 5,
        }
    }
}

struct QueueGroup {
    name: String,
    members: Vec<mpsc::UnboundedSender<Message>>,
    next: usize,
}

impl QueueGroup {
    /// Hand the message to the next live member; dead members are pruned
    fn route(&mut self, mut message: Message) -> bool {
        while !self.members.is_empty() {
            let idx = self.next % self.members.len();
            match self.members[idx].send(message) {
                Ok(()) => {
                    self.next = idx + 1;
                    return true;
                }
                Err(mpsc::error::SendError(returned)) => {
                    self.members.remove(idx);
                    message = returned;
                }
            }
        }
        false
    }
}

struct Inner {
    subjects: Mutex<HashMap<String, Vec<QueueGroup>>>,
    policy: DeliveryPolicy,
    in_flight: AtomicUsize,
    idle: Notify,
    closed: AtomicBool,
}

impl Inner {
    fn subjects(&self) -> MutexGuard<'_, HashMap<String, Vec<QueueGroup>>> {
        match self.subjects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Route to one member of `group`. Returns false if nobody took it.
    fn route_to_group(&self, group: &str, message: Message) -> bool {
        let mut subjects = self.subjects();
        subjects
            .get_mut(&message.subject)
            .and_then(|groups| groups.iter_mut().find(|g| g.name == group))
            .map(|g| g.route(message))
            .unwrap_or(false)
    }

    fn settle(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// In-process [`EventBus`]
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}

impl InMemoryBus {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                subjects: Mutex::new(HashMap::new()),
                policy,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.inner.policy
    }

    /// Deliveries accepted but not yet acknowledged or dropped
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no delivery is in flight.
    ///
    /// Returns false if `timeout` elapsed first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.in_flight() == 0;
            }
        }
    }

    /// Stop accepting publishes and detach all subscribers
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subjects().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let mut subjects = self.inner.subjects();
        let Some(groups) = subjects.get_mut(subject) else {
            tracing::debug!(subject, "No subscribers, message dropped");
            return Ok(());
        };

        for group in groups.iter_mut() {
            self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
            if !group.route(Message::new(subject, payload.clone())) {
                tracing::debug!(subject, group = %group.name, "Queue group has no live members");
                self.inner.settle();
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        group: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut subjects = self.inner.subjects();
            let groups = subjects.entry(subject.to_string()).or_default();
            match groups.iter_mut().find(|g| g.name == group) {
                Some(existing) => existing.members.push(tx),
                None => groups.push(QueueGroup {
                    name: group.to_string(),
                    members: vec![tx],
                    next: 0,
                }),
            }
        }

        tracing::info!(subject, group, subscriber = subscriber.name(), "Subscribed");

        tokio::spawn(run_member(
            Arc::clone(&self.inner),
            group.to_string(),
            subscriber,
            rx,
        ));

        Ok(())
    }
}

async fn run_member(
    inner: Arc<Inner>,
    group: String,
    subscriber: Arc<dyn EventSubscriber>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        let outcome = AssertUnwindSafe(subscriber.handle(&message))
            .catch_unwind()
            .await;

        let reason = match outcome {
            Ok(Ok(())) => {
                inner.settle();
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "handler panicked".to_string(),
        };

        if message.attempt >= inner.policy.max_deliveries {
            tracing::error!(
                subject = %message.subject,
                group = %group,
                subscriber = subscriber.name(),
                attempt = message.attempt,
                error = %reason,
                "Delivery attempts exhausted, message dropped"
            );
            inner.settle();
            continue;
        }

        tracing::warn!(
            subject = %message.subject,
            group = %group,
            subscriber = subscriber.name(),
            attempt = message.attempt,
            error = %reason,
            "Message not acknowledged, scheduling redelivery"
        );

        let inner = Arc::clone(&inner);
        let group = group.clone();
        let delay = inner.policy.redelivery_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let retry = Message {
                attempt: message.attempt + 1,
                ..message
            };
            if !inner.route_to_group(&group, retry) {
                inner.settle();
            }
        });
    }
}
