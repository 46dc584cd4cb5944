//! The in-process Event Bus: typed publish/subscribe with per-channel
//! coalescing, critical, or ring-buffer backpressure policy.

use crate::channel::{Channel, ChannelPolicy, CRITICAL_CAPACITY, CRITICAL_GRACE_MS, RING_CAPACITY};
use crate::ring::RingBuffer;
use crate::subscription::Subscription;
use genesis_events::{
    Event, EvolutionForceEvent, EvolutionPlanEvent, EvolutionTrigger, MutationAppliedEvent, MutationFailedEvent,
    MutationReadyEvent, ParamsChangedEvent,
};
use genesis_protocol::FeedMessage;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

fn channel_of(event: &Event) -> Channel {
    match event {
        Event::Telemetry(_) => Channel::Telemetry,
        Event::EvolutionTrigger(_) => Channel::EvolutionTrigger,
        Event::EvolutionPlan(_) => Channel::EvolutionPlan,
        Event::MutationReady(_) => Channel::MutationReady,
        Event::MutationApplied(_) => Channel::MutationApplied,
        Event::MutationFailed(_) => Channel::MutationFailed,
        Event::ParamsChanged(_) => Channel::ParamsChanged,
        Event::EvolutionForce(_) => Channel::EvolutionForce,
        Event::FeedMessage(_) => Channel::FeedMessage,
    }
}

/// In-process, typed publish/subscribe fabric decoupling every component
/// of the evolution pipeline from every other.
pub struct EventBus {
    telemetry_tx: watch::Sender<Option<Event>>,
    critical_subscribers: RwLock<BTreeMap<Channel, Vec<mpsc::Sender<Event>>>>,
    ring_subscribers: RwLock<BTreeMap<Channel, Vec<Arc<RingBuffer>>>>,
    dropped: RwLock<BTreeMap<Channel, AtomicU64>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// A fresh bus with no subscribers.
    pub fn new() -> Self {
        let (telemetry_tx, _rx) = watch::channel(None);
        EventBus {
            telemetry_tx,
            critical_subscribers: RwLock::new(BTreeMap::new()),
            ring_subscribers: RwLock::new(BTreeMap::new()),
            dropped: RwLock::new(BTreeMap::new()),
        }
    }

    /// Subscribe to `channel`, receiving every event published on it from
    /// this point on.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        let token = CancellationToken::new();
        match channel.policy() {
            ChannelPolicy::Coalescing => Subscription::coalescing(self.telemetry_tx.subscribe(), token),
            ChannelPolicy::Critical => {
                let (tx, rx) = mpsc::channel(CRITICAL_CAPACITY);
                self.critical_subscribers.write().entry(channel).or_default().push(tx);
                Subscription::critical(rx, token)
            }
            ChannelPolicy::RingBuffer => {
                let buffer = Arc::new(RingBuffer::new(RING_CAPACITY));
                self.ring_subscribers
                    .write()
                    .entry(channel)
                    .or_default()
                    .push(buffer.clone());
                Subscription::ring(buffer, token)
            }
        }
    }

    /// Publish `event` on the channel derived from its variant.
    pub async fn publish(&self, event: Event) {
        let channel = channel_of(&event);
        match channel.policy() {
            ChannelPolicy::Coalescing => {
                let _ = self.telemetry_tx.send(Some(event));
            }
            ChannelPolicy::Critical => self.publish_critical(channel, event).await,
            ChannelPolicy::RingBuffer => self.publish_ring(channel, event).await,
        }
    }

    async fn publish_critical(&self, channel: Channel, event: Event) {
        let senders: Vec<mpsc::Sender<Event>> = self
            .critical_subscribers
            .read()
            .get(&channel)
            .cloned()
            .unwrap_or_default();
        for sender in senders {
            if sender.try_send(event.clone()).is_ok() {
                continue;
            }
            let grace = Duration::from_millis(CRITICAL_GRACE_MS);
            match tokio::time::timeout(grace, sender.send(event.clone())).await {
                Ok(Ok(())) => {}
                _ => {
                    tracing::warn!(channel = channel.as_str(), "subscriber queue full past grace period; dropping event");
                    self.dropped
                        .write()
                        .entry(channel)
                        .or_insert_with(|| AtomicU64::new(0))
                        .fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    async fn publish_ring(&self, channel: Channel, event: Event) {
        let buffers: Vec<Arc<RingBuffer>> = self.ring_subscribers.read().get(&channel).cloned().unwrap_or_default();
        for buffer in buffers {
            buffer.push(event.clone()).await;
        }
    }

    /// Number of events dropped on `channel` after the grace period expired.
    pub fn dropped_count(&self, channel: Channel) -> u64 {
        self.dropped
            .read()
            .get(&channel)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Convenience constructors so callers don't need to reach into
/// `genesis-events` just to publish a `FeedMessage` or force an evolution.
impl EventBus {
    /// Publish a narration entry.
    pub async fn narrate(&self, message: FeedMessage) {
        self.publish(Event::FeedMessage(message)).await;
    }

    /// Publish an operator-forced evolution request.
    pub async fn force_evolution(&self, request: EvolutionForceEvent) {
        self.publish(Event::EvolutionForce(request)).await;
    }

    /// Publish a Watcher-detected (or forced) trigger.
    pub async fn trigger_evolution(&self, trigger: EvolutionTrigger) {
        self.publish(Event::EvolutionTrigger(trigger)).await;
    }

    /// Publish an Architect-produced plan.
    pub async fn publish_plan(&self, plan: EvolutionPlanEvent) {
        self.publish(Event::EvolutionPlan(plan)).await;
    }

    /// Publish a Coder-persisted mutation.
    pub async fn publish_mutation_ready(&self, mutation: MutationReadyEvent) {
        self.publish(Event::MutationReady(mutation)).await;
    }

    /// Publish a Patcher-installed mutation.
    pub async fn publish_mutation_applied(&self, mutation: MutationAppliedEvent) {
        self.publish(Event::MutationApplied(mutation)).await;
    }

    /// Publish a pipeline failure.
    pub async fn publish_mutation_failed(&self, failure: MutationFailedEvent) {
        self.publish(Event::MutationFailed(failure)).await;
    }

    /// Publish an applied parameter change.
    pub async fn publish_params_changed(&self, change: ParamsChangedEvent) {
        self.publish(Event::ParamsChanged(change)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_events::{ProblemType, Severity, WorldContext};
    use uuid::Uuid;

    #[tokio::test]
    async fn telemetry_subscriber_sees_the_latest_snapshot_only() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Channel::Telemetry);
        bus.publish(Event::EvolutionForce(EvolutionForceEvent {
            reason: None,
            severity: None,
            occurred_at: 0,
        }))
        .await;
        // wrong channel; coalescing subscriber must not see it
        let result = tokio::time::timeout(Duration::from_millis(20), sub.recv()).await;
        assert!(result.is_err(), "subscriber should still be waiting");
    }

    #[tokio::test]
    async fn critical_channel_fans_out_to_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe(Channel::EvolutionTrigger);
        let mut b = bus.subscribe(Channel::EvolutionTrigger);
        let trigger = EvolutionTrigger {
            cycle_id: Uuid::nil(),
            problem_type: ProblemType::Starvation,
            severity: Severity::High,
            snapshot_key: 1,
            world_context: WorldContext {
                entity_count: 5,
                mean_energy: 10.0,
                known_traits: vec![],
            },
            occurred_at: 0,
        };
        bus.trigger_evolution(trigger).await;
        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn canceled_subscription_returns_none() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Channel::FeedMessage);
        sub.cancel();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn ring_channel_delivers_newest_first_after_overflow() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Channel::ParamsChanged);
        for i in 0..(crate::channel::RING_CAPACITY as u64 + 5) {
            bus.publish_params_changed(ParamsChangedEvent {
                name: "friction".to_string(),
                value: serde_json::json!(i),
                occurred_at: i,
            })
            .await;
        }
        let first = sub.recv().await.expect("event");
        if let Event::ParamsChanged(change) = first {
            assert!(change.occurred_at >= 5);
        } else {
            panic!("unexpected event variant");
        }
    }
}
