//! Completion event fan-out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

/// One-shot signal for a timer that just reached zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub id: u64,
    pub name: String,
    pub completed_at: DateTime<Utc>,
}

/// Stateless fan-out of completion events to the presentation layer.
///
/// A watch channel holds the latest completion: one slot, last value
/// wins. Each completion is published exactly once (the dedup lives in
/// the registry's `Running -> Completed` transition), so a subscriber
/// that awaits `changed()` sees a given completion at most once.
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: watch::Sender<Option<CompletionEvent>>,
    /// Keeps the channel open while no observer is registered.
    _rx: watch::Receiver<Option<CompletionEvent>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx, _rx: rx }
    }

    pub fn publish(&self, event: CompletionEvent) {
        if self.tx.send(Some(event)).is_err() {
            warn!("completion event dropped: channel closed");
        }
    }

    /// Register an observer. Receivers created later supersede earlier
    /// ones from the presentation layer's point of view; each sees a
    /// completion at most once via `changed()`.
    pub fn subscribe(&self) -> watch::Receiver<Option<CompletionEvent>> {
        self.tx.subscribe()
    }

    /// Most recent completion, if any.
    pub fn last(&self) -> Option<CompletionEvent> {
        self.tx.borrow().clone()
    }
}

impl Default for CompletionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_each_completion_once() {
        let notifier = CompletionNotifier::new();
        let mut rx = notifier.subscribe();
        assert!(rx.borrow().is_none());

        notifier.publish(CompletionEvent {
            id: 1,
            name: "Tea".into(),
            completed_at: Utc::now(),
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().name, "Tea");
        assert!(!rx.has_changed().unwrap());
        assert_eq!(notifier.last().unwrap().id, 1);
    }
}
