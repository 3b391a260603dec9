//! Thread-safe unbounded FIFO of pending events.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::QueueError;
use crate::event::Event;

/// Shared queue drained by competing workers.
///
/// Every operation takes one exclusive lock for its own duration only; the
/// lock is never held across an await. `size`/`is_empty` are snapshots.
///
/// Enqueue order is kept in the backing sequence. With several consumers
/// the processing order across workers is best-effort.
pub struct EventQueue<P> {
    events: Mutex<VecDeque<Event<P>>>,
    notify: Notify,
}

impl<P> EventQueue<P> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Pre-filled queue, in iteration order.
    pub fn with_events(events: impl IntoIterator<Item = Event<P>>) -> Self {
        Self {
            events: Mutex::new(events.into_iter().collect()),
            notify: Notify::new(),
        }
    }

    /// Append to the tail and wake one waiting worker.
    pub fn enqueue(&self, event: Event<P>) {
        self.lock().push_back(event);
        self.notify.notify_one();
    }

    /// Append a batch under one lock.
    pub fn enqueue_all(&self, batch: impl IntoIterator<Item = Event<P>>) {
        let added = {
            let mut events = self.lock();
            let before = events.len();
            events.extend(batch);
            events.len() - before
        };
        if added > 0 {
            self.notify.notify_one();
        }
    }

    /// Remove the head without waiting.
    pub fn dequeue(&self) -> Result<Event<P>, QueueError> {
        let (event, more) = {
            let mut events = self.lock();
            let event = events.pop_front().ok_or(QueueError::Empty)?;
            (event, !events.is_empty())
        };

        // Notify keeps at most one permit, so a burst of enqueues can wake a
        // single worker. Pass the wake-up on while work remains.
        if more {
            self.notify.notify_one();
        }
        Ok(event)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Resolves once an enqueue happened since the last consumed wake-up.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event<P>>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for EventQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dequeue_returns_events_in_enqueue_order() {
        let queue = EventQueue::new();
        queue.enqueue(Event::new("1", "First"));
        queue.enqueue(Event::new("2", "Second"));

        let first = queue.dequeue().unwrap();
        let second = queue.dequeue().unwrap();

        assert_eq!(first.id().as_str(), "1");
        assert_eq!(second.id().as_str(), "2");
        assert_eq!(*second.payload(), "Second");
    }

    #[test]
    fn dequeue_on_fresh_queue_reports_empty() {
        let queue: EventQueue<()> = EventQueue::new();
        assert_eq!(queue.dequeue().unwrap_err(), QueueError::Empty);
    }

    #[test]
    fn size_and_is_empty_track_contents() {
        let queue = EventQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);

        queue.enqueue(Event::new("a", 1));
        queue.enqueue(Event::new("b", 2));
        assert!(!queue.is_empty());
        assert_eq!(queue.size(), 2);

        queue.dequeue().unwrap();
        queue.dequeue().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_ids_are_not_deduplicated() {
        let queue = EventQueue::new();
        queue.enqueue(Event::new("same", 1));
        queue.enqueue(Event::new("same", 2));
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn with_events_and_enqueue_all_keep_order() {
        let queue = EventQueue::with_events([Event::new("a", ()), Event::new("b", ())]);
        queue.enqueue_all([Event::new("c", ())]);

        let ids: Vec<String> = std::iter::from_fn(|| queue.dequeue().ok())
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn enqueue_wakes_waiting_consumer() {
        let queue = Arc::new(EventQueue::new());

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                queue.notified().await;
                queue.dequeue()
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(Event::new("late", ()));

        let event = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.id().as_str(), "late");
    }

    #[tokio::test]
    async fn enqueue_before_wait_is_not_lost() {
        let queue = EventQueue::new();
        queue.enqueue(Event::new("early", ()));

        tokio::time::timeout(Duration::from_millis(100), queue.notified())
            .await
            .unwrap();
    }
}
