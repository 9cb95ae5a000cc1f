//! In-process event bus: durable per-subject streams, queue-group
//! round-robin delivery, explicit ack/nak, backoff redelivery and
//! dead-letter routing once a message's `max_deliver` budget is spent.

use crate::envelope::{DeadLetterMetadata, Envelope};
use crate::health::{BusHealth, StreamHealth};
use crate::subjects::dlq_subject;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, warn};
use traceledger_core::Result;
use uuid::Uuid;

const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// A single queued delivery handed to a subscriber. Every `Delivery` must be
/// resolved with [`Delivery::ack`] or [`Delivery::nak`]; an unresolved
/// delivery is redelivered once its ack deadline elapses.
pub struct Delivery {
    delivery_id: Uuid,
    pub subject: String,
    pub envelope: Envelope,
    pub attempt: u32,
    bus: Arc<Inner>,
}

impl Delivery {
    pub fn ack(&self) {
        self.bus.ack(self.delivery_id);
    }

    pub fn nak(&self, reason: impl Into<String>) {
        self.bus.nak(self.delivery_id, reason.into());
    }

    /// Route straight to the dead-letter subject, bypassing the retry
    /// schedule. Used for permanent (validation) failures that would never
    /// succeed on redelivery.
    pub fn dead_letter(&self, reason: impl Into<String>) {
        self.bus.dead_letter_now(self.delivery_id, reason.into());
    }
}

pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, subject: &str, envelope: Envelope) -> Result<()>;
    async fn subscribe(&self, subject: &str, group: &str) -> Result<Subscription>;
    async fn health(&self) -> BusHealth;
}

struct PendingMessage {
    subject: String,
    group: String,
    envelope: Envelope,
    attempt: u32,
    deadline: Instant,
    last_error: Option<String>,
}

struct GroupState {
    senders: Vec<mpsc::UnboundedSender<Delivery>>,
    next: AtomicUsize,
}

impl GroupState {
    fn pick(&self) -> Option<&mpsc::UnboundedSender<Delivery>> {
        if self.senders.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders.get(idx)
    }
}

#[derive(Default)]
struct StreamState {
    groups: DashMap<String, GroupState>,
    dead_lettered: AtomicU64,
}

pub struct Inner {
    streams: DashMap<String, StreamState>,
    pending: DashMap<Uuid, PendingMessage>,
    max_deliver: u32,
    backoff_schedule: Vec<Duration>,
    ack_deadline: Duration,
}

impl Inner {
    fn stream(&self, subject: &str) -> dashmap::mapref::one::RefMut<'_, String, StreamState> {
        self.streams.entry(subject.to_string()).or_default()
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let idx = (attempt.saturating_sub(1) as usize).min(self.backoff_schedule.len() - 1);
        self.backoff_schedule[idx]
    }

    fn dispatch(self: &Arc<Self>, subject: &str, group: &str, envelope: Envelope, attempt: u32) {
        let sender = {
            let stream = self.stream(subject);
            match stream.groups.get(group) {
                Some(g) => g.pick().cloned(),
                None => None,
            }
        };
        let Some(sender) = sender else {
            debug!(subject, group, "no live subscriber to dispatch to, message stays pending");
            return;
        };
        let delivery_id = Uuid::new_v4();
        self.pending.insert(
            delivery_id,
            PendingMessage {
                subject: subject.to_string(),
                group: group.to_string(),
                envelope: envelope.clone(),
                attempt,
                deadline: Instant::now() + self.ack_deadline,
                last_error: None,
            },
        );
        let delivery = Delivery {
            delivery_id,
            subject: subject.to_string(),
            envelope,
            attempt,
            bus: Arc::clone(self),
        };
        if sender.send(delivery).is_err() {
            self.pending.remove(&delivery_id);
        }
    }

    fn ack(self: &Arc<Self>, delivery_id: Uuid) {
        if self.pending.remove(&delivery_id).is_none() {
            debug!(%delivery_id, "ack for unknown or already-resolved delivery");
        }
    }

    fn nak(self: &Arc<Self>, delivery_id: Uuid, reason: String) {
        let Some((_, pending)) = self.pending.remove(&delivery_id) else {
            return;
        };
        self.retry_or_deadletter(pending, Some(reason));
    }

    fn dead_letter_now(self: &Arc<Self>, delivery_id: Uuid, reason: String) {
        let Some((_, mut pending)) = self.pending.remove(&delivery_id) else {
            return;
        };
        pending.last_error = Some(reason);
        self.deadletter(pending);
    }

    fn retry_or_deadletter(self: &Arc<Self>, mut pending: PendingMessage, reason: Option<String>) {
        if let Some(reason) = reason {
            pending.last_error = Some(reason);
        }
        if pending.attempt >= self.max_deliver {
            self.deadletter(pending);
            return;
        }
        let next_attempt = pending.attempt + 1;
        let subject = pending.subject.clone();
        let group = pending.group.clone();
        let envelope = pending.envelope.clone();
        warn!(
            subject = %subject,
            group = %group,
            attempt = next_attempt,
            "redelivering message after nak or ack-deadline expiry"
        );
        self.dispatch(&subject, &group, envelope, next_attempt);
    }

    fn deadletter(self: &Arc<Self>, pending: PendingMessage) {
        let dlq = dlq_subject(&pending.subject);
        let meta = DeadLetterMetadata {
            original_subject: pending.subject.clone(),
            last_error: pending.last_error.unwrap_or_else(|| "ack deadline exceeded".to_string()),
            retry_count: pending.attempt,
            failed_at: Utc::now(),
        };
        warn!(subject = %pending.subject, dlq = %dlq, retry_count = pending.attempt, "message exhausted max_deliver, routing to dead letter");
        {
            let stream = self.stream(&pending.subject);
            stream.dead_lettered.fetch_add(1, Ordering::Relaxed);
        }
        let envelope = pending
            .envelope
            .with_metadata(serde_json::to_value(meta).unwrap_or(serde_json::Value::Null));
        let dlq_stream = self.stream(&dlq);
        let group_names: Vec<String> =
            dlq_stream.groups.iter().map(|e| e.key().clone()).collect();
        drop(dlq_stream);
        for group in group_names {
            self.dispatch(&dlq, &group, envelope.clone(), 1);
        }
    }

    fn sweep(self: &Arc<Self>) {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|entry| entry.value().deadline <= now)
            .map(|entry| *entry.key())
            .collect();
        for id in expired {
            if let Some((_, pending)) = self.pending.remove(&id) {
                self.retry_or_deadletter(pending, Some("ack deadline exceeded".to_string()));
            }
        }
    }
}

/// In-process implementation of [`EventBus`]. Suitable for single-process
/// deployments and tests; an out-of-process deployment would implement the
/// same trait against a durable broker without touching callers.
pub struct InProcessBus {
    inner: Arc<Inner>,
}

impl InProcessBus {
    pub fn new(max_deliver: u32, backoff_schedule_secs: &[u64], ack_deadline: Duration) -> Self {
        let backoff_schedule = backoff_schedule_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect::<Vec<_>>();
        let backoff_schedule =
            if backoff_schedule.is_empty() { vec![Duration::from_secs(1)] } else { backoff_schedule };
        let inner = Arc::new(Inner {
            streams: DashMap::new(),
            pending: DashMap::new(),
            max_deliver,
            backoff_schedule,
            ack_deadline,
        });
        let sweeper = Arc::clone(&inner);
        tokio::spawn(async move {
            let mut tick = interval(SWEEP_INTERVAL);
            loop {
                tick.tick().await;
                sweeper.sweep();
            }
        });
        Self { inner }
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, subject: &str, envelope: Envelope) -> Result<()> {
        let group_names: Vec<String> = {
            let stream = self.inner.stream(subject);
            stream.groups.iter().map(|e| e.key().clone()).collect()
        };
        for group in group_names {
            self.inner.dispatch(subject, &group, envelope.clone(), 1);
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str, group: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = self.inner.stream(subject);
        stream
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState { senders: Vec::new(), next: AtomicUsize::new(0) })
            .senders
            .push(tx);
        Ok(Subscription { rx })
    }

    async fn health(&self) -> BusHealth {
        let mut by_subject: std::collections::HashMap<String, StreamHealth> =
            std::collections::HashMap::new();
        for entry in self.inner.streams.iter() {
            let subject = entry.key().clone();
            let health = by_subject.entry(subject.clone()).or_insert_with(|| StreamHealth {
                subject: subject.clone(),
                ..Default::default()
            });
            health.dead_lettered = entry.value().dead_lettered.load(Ordering::Relaxed);
        }
        for entry in self.inner.pending.iter() {
            let pending = entry.value();
            let health =
                by_subject.entry(pending.subject.clone()).or_insert_with(|| StreamHealth {
                    subject: pending.subject.clone(),
                    ..Default::default()
                });
            health.in_flight += 1;
            health.approx_bytes += pending.envelope.approx_bytes();
        }
        BusHealth { streams: by_subject.into_values().collect() }
    }
}
