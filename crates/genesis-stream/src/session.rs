//! Observer session registry (spec.md §4.11): every connected `/ws/stream`
//! client gets a `SessionId` and an `OutboundQueue`; the Stream Multiplexer
//! fans frames and narrations out to every registered session.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::outbound::OutboundQueue;

/// Default bound on one session's outbound queue depth.
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 16;

/// Opaque handle identifying one connected observer.
pub type SessionId = Uuid;

/// One connected observer: its outbound queue and whether it negotiated
/// the legacy binary world-frame layout at handshake time.
pub struct Session {
    /// The session's outbound queue.
    pub queue: Arc<OutboundQueue>,
    /// `true` if this session should receive `WorldFrame::encode_legacy`
    /// output instead of the current layout.
    pub wants_legacy_frames: bool,
}

/// The live set of connected observer sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    /// Register a new session, returning its id and outbound queue.
    pub fn register(&self, wants_legacy_frames: bool) -> (SessionId, Arc<OutboundQueue>) {
        let id = Uuid::new_v4();
        let queue = Arc::new(OutboundQueue::new(DEFAULT_SESSION_QUEUE_CAPACITY));
        self.sessions.write().insert(
            id,
            Session {
                queue: queue.clone(),
                wants_legacy_frames,
            },
        );
        (id, queue)
    }

    /// Drop a session, e.g. once its WebSocket connection closes.
    pub fn unregister(&self, id: SessionId) {
        self.sessions.write().remove(&id);
    }

    /// Number of currently connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// `true` if no sessions are currently connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Every session's queue and legacy preference, for a fan-out pass.
    pub fn snapshot(&self) -> Vec<(SessionId, Arc<OutboundQueue>, bool)> {
        self.sessions
            .read()
            .iter()
            .map(|(id, session)| (*id, session.queue.clone(), session.wants_legacy_frames))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_round_trip() {
        let registry = SessionRegistry::new();
        let (id, _queue) = registry.register(false);
        assert_eq!(registry.len(), 1);
        registry.unregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_reflects_each_sessions_legacy_preference() {
        let registry = SessionRegistry::new();
        let (legacy_id, _) = registry.register(true);
        let (current_id, _) = registry.register(false);
        let snap = registry.snapshot();
        let legacy_entry = snap.iter().find(|(id, _, _)| *id == legacy_id).unwrap();
        let current_entry = snap.iter().find(|(id, _, _)| *id == current_id).unwrap();
        assert!(legacy_entry.2);
        assert!(!current_entry.2);
    }
}
