//! A cancelable handle returned by `EventBus::subscribe`.

use crate::ring::RingBuffer;
use genesis_events::Event;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

enum Receiver {
    Coalescing(watch::Receiver<Option<Event>>),
    Critical(mpsc::Receiver<Event>),
    Ring(Arc<RingBuffer>),
}

/// A live subscription to one channel. Drop it, or call
/// [`Subscription::cancel`], to stop receiving and let the bus reclaim the
/// subscriber slot on critical channels.
pub struct Subscription {
    receiver: Receiver,
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn coalescing(receiver: watch::Receiver<Option<Event>>, token: CancellationToken) -> Self {
        Subscription {
            receiver: Receiver::Coalescing(receiver),
            token,
        }
    }

    pub(crate) fn critical(receiver: mpsc::Receiver<Event>, token: CancellationToken) -> Self {
        Subscription {
            receiver: Receiver::Critical(receiver),
            token,
        }
    }

    pub(crate) fn ring(buffer: Arc<RingBuffer>, token: CancellationToken) -> Self {
        Subscription {
            receiver: Receiver::Ring(buffer),
            token,
        }
    }

    /// Cancel this subscription; the next (or in-flight) `recv` returns `None`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once this subscription has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the next event, or `None` once canceled (or, for a
    /// coalescing channel, once the publisher side has been dropped).
    pub async fn recv(&mut self) -> Option<Event> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = Self::recv_inner(&mut self.receiver) => event,
        }
    }

    async fn recv_inner(receiver: &mut Receiver) -> Option<Event> {
        match receiver {
            Receiver::Coalescing(rx) => loop {
                if rx.changed().await.is_err() {
                    return None;
                }
                if let Some(event) = rx.borrow_and_update().clone() {
                    return Some(event);
                }
            },
            Receiver::Critical(rx) => rx.recv().await,
            Receiver::Ring(buffer) => Some(buffer.pop().await),
        }
    }
}
