//! A bounded per-session outbound queue (spec.md §4.11): a binary world
//! frame or a narration JSON document, fanned out to one WebSocket writer.
//!
//! Modeled on `genesis-bus`'s ring buffer (`genesis_bus::ring::RingBuffer`):
//! a `Mutex<VecDeque<_>>` plus a `Notify`, but specialized to the two
//! overflow rules spec.md §4.11 actually asks for — newest-frame-displaces-
//! oldest, and narration coalescing only when byte-identical — rather than
//! the bus's one-size-fits-all policy.

use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

/// One message queued for delivery to an observer session.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// An encoded `WorldFrame`, current or legacy layout per the session's handshake.
    Frame(Vec<u8>),
    /// A `FeedMessage`, serialized to JSON.
    Narration(Vec<u8>),
}

/// The outbound queue behind one session. Bounded at `capacity` entries;
/// a full queue drops its oldest entry to make room for a new frame, and a
/// narration byte-identical to the most recently queued one is dropped
/// instead of appended.
pub struct OutboundQueue {
    capacity: usize,
    queue: Mutex<VecDeque<OutboundMessage>>,
    notify: Notify,
}

impl OutboundQueue {
    /// A fresh, empty queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        OutboundQueue {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Queue a world frame, displacing the oldest entry if already full.
    pub async fn push_frame(&self, bytes: Vec<u8>) {
        self.push(OutboundMessage::Frame(bytes)).await;
    }

    /// Queue a narration, coalescing with the previous entry if they are
    /// byte-identical narrations.
    pub async fn push_narration(&self, bytes: Vec<u8>) {
        let mut queue = self.queue.lock().await;
        if let Some(OutboundMessage::Narration(last)) = queue.back() {
            if *last == bytes {
                return;
            }
        }
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(OutboundMessage::Narration(bytes));
        drop(queue);
        self.notify.notify_one();
    }

    async fn push(&self, message: OutboundMessage) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(message);
        drop(queue);
        self.notify.notify_one();
    }

    /// Wait for and pop the oldest queued message.
    pub async fn pop(&self) -> OutboundMessage {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(message) = queue.pop_front() {
                    return message;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Current queue depth, for `/stats`-style introspection.
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overflow_drops_the_oldest_frame() {
        let q = OutboundQueue::new(2);
        q.push_frame(vec![1]).await;
        q.push_frame(vec![2]).await;
        q.push_frame(vec![3]).await;
        assert_eq!(q.pop().await, OutboundMessage::Frame(vec![2]));
        assert_eq!(q.pop().await, OutboundMessage::Frame(vec![3]));
    }

    #[tokio::test]
    async fn identical_consecutive_narrations_coalesce() {
        let q = OutboundQueue::new(4);
        q.push_narration(vec![9]).await;
        q.push_narration(vec![9]).await;
        q.push_narration(vec![9]).await;
        assert_eq!(q.len().await, 1);
        assert_eq!(q.pop().await, OutboundMessage::Narration(vec![9]));
    }

    #[tokio::test]
    async fn distinct_narrations_both_queue() {
        let q = OutboundQueue::new(4);
        q.push_narration(vec![1]).await;
        q.push_narration(vec![2]).await;
        assert_eq!(q.len().await, 2);
    }
}
