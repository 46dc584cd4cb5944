//! A bounded queue with newest-overflow-drops-oldest semantics, used for
//! non-critical channels (`FeedMessage`, `ParamsChanged`, `EvolutionForce`).

use genesis_events::Event;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio::sync::Mutex;

/// One subscriber's ring buffer.
pub struct RingBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
}

impl RingBuffer {
    /// A fresh, empty ring buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Push `event`, dropping the oldest entry if already at capacity.
    pub async fn push(&self, event: Event) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    /// Wait for and pop the oldest entry.
    pub async fn pop(&self) -> Event {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_events::ParamsChangedEvent;

    fn sample(n: u64) -> Event {
        Event::ParamsChanged(ParamsChangedEvent {
            name: "friction".to_string(),
            value: serde_json::json!(n),
            occurred_at: n,
        })
    }

    #[tokio::test]
    async fn overflow_drops_the_oldest_entry() {
        let ring = RingBuffer::new(2);
        ring.push(sample(1)).await;
        ring.push(sample(2)).await;
        ring.push(sample(3)).await;
        let first = ring.pop().await;
        let second = ring.pop().await;
        match (first, second) {
            (Event::ParamsChanged(a), Event::ParamsChanged(b)) => {
                assert_eq!(a.occurred_at, 2);
                assert_eq!(b.occurred_at, 3);
            }
            _ => panic!("unexpected event variant"),
        }
    }
}
