use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};
use tokio::sync::broadcast;

use crate::metrics::EfficiencyMetrics;
use crate::models::ActivityKind;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerEvent {
    #[serde(rename_all = "camelCase")]
    ActivityDetected {
        kind: ActivityKind,
        intensity: f64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    AfkDetected {
        duration_ms: u64,
        since: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    FocusLost { timestamp: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    EfficiencyUpdated { metrics: EfficiencyMetrics },
}

impl TrackerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::ActivityDetected { .. } => "activity-detected",
            TrackerEvent::AfkDetected { .. } => "afk-detected",
            TrackerEvent::FocusLost { .. } => "focus-lost",
            TrackerEvent::EfficiencyUpdated { .. } => "efficiency-updated",
        }
    }
}

pub type SubscriptionId = u64;

type Subscriber = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Fan-out for tracker events.
///
/// Callbacks run synchronously on the dispatching thread, after the producer
/// has released its own lock. A panicking subscriber is logged and skipped.
/// Async consumers can take a broadcast receiver instead; a lagging receiver
/// loses the oldest events rather than slowing the producer.
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
    channel: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            channel,
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = guard.len();
        guard.retain(|(existing, _)| *existing != id);
        guard.len() != before
    }

    pub fn receiver(&self) -> broadcast::Receiver<TrackerEvent> {
        self.channel.subscribe()
    }

    pub fn dispatch(&self, event: TrackerEvent) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in subscribers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
            if outcome.is_err() {
                error!("subscriber panicked while handling {}", event.name());
            }
        }

        // No receivers is not an error.
        let _ = self.channel.send(event);
    }

    pub fn dispatch_all(&self, events: Vec<TrackerEvent>) {
        for event in events {
            self.dispatch(event);
        }
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
    use std::sync::Mutex;

    fn focus_lost() -> TrackerEvent {
        TrackerEvent::FocusLost {
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(|_| panic!("subscriber failure"));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.name()));

        bus.dispatch(focus_lost());
        bus.dispatch(focus_lost());

        assert_eq!(*seen.lock().unwrap(), vec!["focus-lost", "focus-lost"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.dispatch(focus_lost());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(focus_lost());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_receiver_gets_events() {
        let bus = EventBus::new();
        let mut rx = bus.receiver();
        bus.dispatch(TrackerEvent::AfkDetected {
            duration_ms: 120_000,
            since: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "afk-detected");
    }

    #[test]
    fn test_event_json_shape() {
        let event = TrackerEvent::AfkDetected {
            duration_ms: 5,
            since: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "afkDetected");
        assert_eq!(json["durationMs"], 5);
    }
}
