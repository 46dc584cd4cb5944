//! The Stream Multiplexer (spec.md §4.11): fans one `WorldFrame` or
//! `FeedMessage` out to every registered observer session, encoding each
//! only once per broadcast regardless of session count.

use std::sync::Arc;

use genesis_protocol::{FeedMessage, WorldFrame};

use crate::session::SessionRegistry;

/// Owns the session registry and performs the actual fan-out.
#[derive(Default)]
pub struct StreamMultiplexer {
    registry: Arc<SessionRegistry>,
}

impl StreamMultiplexer {
    /// A multiplexer with no sessions yet connected.
    pub fn new() -> Self {
        StreamMultiplexer {
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Shared handle to the session registry, for the `/ws/stream` route
    /// to register and unregister connections against.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Encode `frame` once per layout and push it to every session's
    /// outbound queue, current or legacy per its handshake preference.
    pub async fn broadcast_frame(&self, frame: &WorldFrame) {
        let sessions = self.registry.snapshot();
        if sessions.is_empty() {
            return;
        }
        let current = frame.encode();
        let legacy = frame.encode_legacy();
        for (_, queue, wants_legacy) in sessions {
            let bytes = if wants_legacy { legacy.clone() } else { current.clone() };
            queue.push_frame(bytes).await;
        }
    }

    /// Serialize `message` once and push it to every session's outbound
    /// queue (subject to each session's own coalescing rule).
    pub async fn broadcast_narration(&self, message: &FeedMessage) {
        let sessions = self.registry.snapshot();
        if sessions.is_empty() {
            return;
        }
        let bytes = match serde_json::to_vec(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize narration for broadcast");
                return;
            }
        };
        for (_, queue, _) in sessions {
            queue.push_narration(bytes.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::OutboundMessage;
    use genesis_protocol::{AgentTag, EntityRecord, ResourceRecord};

    fn sample_frame() -> WorldFrame {
        WorldFrame {
            tick: 7,
            entities: vec![EntityRecord { id: 1, x: 0.0, y: 0.0, radius: 1.0, color: 0, flags: 0 }],
            resources: vec![ResourceRecord { x: 1.0, y: 1.0 }],
        }
    }

    #[tokio::test]
    async fn each_session_receives_its_preferred_layout() {
        let mux = StreamMultiplexer::new();
        let (_, current_queue) = mux.registry().register(false);
        let (_, legacy_queue) = mux.registry().register(true);

        mux.broadcast_frame(&sample_frame()).await;

        let current = current_queue.pop().await;
        let legacy = legacy_queue.pop().await;
        match (current, legacy) {
            (OutboundMessage::Frame(a), OutboundMessage::Frame(b)) => {
                assert_eq!(a, sample_frame().encode());
                assert_eq!(b, sample_frame().encode_legacy());
                assert_ne!(a.len(), b.len());
            }
            _ => panic!("expected frame messages"),
        }
    }

    #[tokio::test]
    async fn narration_fans_out_to_every_session() {
        let mux = StreamMultiplexer::new();
        let (_, a) = mux.registry().register(false);
        let (_, b) = mux.registry().register(false);
        let msg = FeedMessage::plain(AgentTag::System, "tick", "hello", 0);

        mux.broadcast_narration(&msg).await;

        assert_eq!(a.len().await, 1);
        assert_eq!(b.len().await, 1);
    }

    #[tokio::test]
    async fn broadcast_with_no_sessions_is_a_no_op() {
        let mux = StreamMultiplexer::new();
        mux.broadcast_frame(&sample_frame()).await;
        mux.broadcast_narration(&FeedMessage::plain(AgentTag::System, "tick", "hello", 0)).await;
    }
}
