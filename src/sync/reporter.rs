//! Outcome events for the UI layer.
//!
//! The reporter is a broadcast hub: any number of subscribers each get every
//! event published after they subscribed. Publishing never waits for
//! subscribers, and a subscriber that falls too far behind skips the oldest
//! events instead of holding up sync.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{RecordId, RecordKind};

/// Events buffered per subscriber before old ones are dropped.
pub const DEFAULT_CAPACITY: usize = 64;

/// A terminal outcome worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A record reached the local store.
    RecordSaved { kind: RecordKind, id: RecordId },
    /// A pass over one kind finished.
    SyncCompleted {
        kind: RecordKind,
        success: bool,
        synced: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A record was parked after repeated rejections.
    RecordQuarantined {
        kind: RecordKind,
        id: RecordId,
        reason: String,
    },
}

/// Publish side of the event stream. Cheap to clone.
#[derive(Clone)]
pub struct Reporter {
    sender: broadcast::Sender<SyncEvent>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish.
    pub fn publish(&self, event: SyncEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side of the event stream. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<SyncEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once every reporter is gone.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Stops receiving events.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(id: RecordId) -> SyncEvent {
        SyncEvent::RecordSaved {
            kind: RecordKind::Workout,
            id,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let reporter = Reporter::new();
        let mut first = reporter.subscribe();
        let mut second = reporter.subscribe();

        reporter.publish(saved(1));

        assert_eq!(first.recv().await, Some(saved(1)));
        assert_eq!(second.recv().await, Some(saved(1)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let reporter = Reporter::new();
        reporter.publish(saved(1));

        // Late subscribers only see later events
        let mut late = reporter.subscribe();
        assert!(late.try_recv().is_none());
        reporter.publish(saved(2));
        assert_eq!(late.try_recv(), Some(saved(2)));
    }

    #[test]
    fn test_unsubscribe_drops_receiver() {
        let reporter = Reporter::new();
        let sub = reporter.subscribe();
        assert_eq!(reporter.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(reporter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_oldest() {
        let reporter = Reporter::with_capacity(2);
        let mut sub = reporter.subscribe();

        for id in 1..=5 {
            reporter.publish(saved(id));
        }

        // Publisher never blocked; subscriber resumes with what is left
        assert_eq!(sub.recv().await, Some(saved(4)));
        assert_eq!(sub.recv().await, Some(saved(5)));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_closed() {
        let reporter = Reporter::new();
        let mut sub = reporter.subscribe();
        drop(reporter);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_event_json_shape() {
        let event = SyncEvent::SyncCompleted {
            kind: RecordKind::NutritionLog,
            success: false,
            synced: 0,
            error: Some("Connection error: refused".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sync_completed");
        assert_eq!(json["kind"], "nutrition_log");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Connection error: refused");

        let ok = SyncEvent::SyncCompleted {
            kind: RecordKind::Workout,
            success: true,
            synced: 3,
            error: None,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("error").is_none());
    }
}
