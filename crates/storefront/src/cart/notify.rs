//! Shopper-facing notifications (toasts) and the observer interface.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened, so the presenter can pick an icon and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Added,
    Removed,
    Updated,
    Cleared,
    Success,
    Error,
}

/// A single toast message.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }
}

/// Receives every notification emitted by a [`CartStore`](super::CartStore).
///
/// Observers are called synchronously, in subscription order, on the thread
/// performing the mutation.
pub trait CartObserver: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> CartObserver for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification);
    }
}

/// Bounded queue of pending toasts, drained by the HTTP layer after each
/// request so the client can show them.
#[derive(Debug)]
pub struct ToastQueue {
    pending: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl ToastQueue {
    pub const DEFAULT_CAPACITY: usize = 20;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Queue a toast, dropping the oldest once the queue is full.
    pub fn push(&self, notification: Notification) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() == self.capacity {
            pending.pop_front();
        }
        pending.push_back(notification);
    }

    /// Take every queued toast, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl CartObserver for ToastQueue {
    fn notify(&self, notification: &Notification) {
        self.push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drains_in_order() {
        let queue = ToastQueue::default();
        queue.notify(&Notification::new(NotificationKind::Added, "Added Tote"));
        queue.push(Notification::success("Order placed"));

        let drained = queue.drain();
        let messages: Vec<_> = drained.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["Added Tote", "Order placed"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let queue = ToastQueue::new(2);
        for message in ["one", "two", "three"] {
            queue.push(Notification::success(message));
        }
        let messages: Vec<_> = queue.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, ["two", "three"]);
    }

    #[test]
    fn test_kind_wire_value() {
        let json = serde_json::to_value(Notification::error("nope")).unwrap_or_default();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["message"], "nope");
    }
}
