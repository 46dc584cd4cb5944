//! The closed set of bus channels and their coalescing policy.

/// Default bounded capacity for a critical-channel subscriber queue.
pub const CRITICAL_CAPACITY: usize = 64;
/// Default capacity for a ring-buffer (non-critical) subscriber queue.
pub const RING_CAPACITY: usize = 32;
/// Grace period a critical publish waits on a full queue before logging a drop.
pub const CRITICAL_GRACE_MS: u64 = 100;

/// How a channel behaves under subscriber backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// A `watch`-backed single slot: publish always replaces it.
    Coalescing,
    /// A bounded queue per subscriber; publish blocks briefly before
    /// logging a drop rather than silently discarding.
    Critical,
    /// A bounded ring buffer per subscriber; on overflow the newest entry
    /// displaces the oldest.
    RingBuffer,
}

/// A named, fixed bus channel. One `Event` variant is published on each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Periodic telemetry snapshots.
    Telemetry,
    /// Watcher-emitted anomaly triggers.
    EvolutionTrigger,
    /// Architect-emitted plans.
    EvolutionPlan,
    /// Coder-emitted ready mutations.
    MutationReady,
    /// Patcher-emitted successful installs.
    MutationApplied,
    /// Patcher-emitted failures.
    MutationFailed,
    /// Applied `ApplyParams` changes.
    ParamsChanged,
    /// Operator-forced evolution requests.
    EvolutionForce,
    /// Human-readable narration entries.
    FeedMessage,
}

impl Channel {
    /// This channel's backpressure policy, per spec.md §4.4.
    pub fn policy(self) -> ChannelPolicy {
        match self {
            Channel::Telemetry => ChannelPolicy::Coalescing,
            Channel::EvolutionTrigger
            | Channel::EvolutionPlan
            | Channel::MutationReady
            | Channel::MutationApplied
            | Channel::MutationFailed => ChannelPolicy::Critical,
            Channel::ParamsChanged | Channel::EvolutionForce | Channel::FeedMessage => ChannelPolicy::RingBuffer,
        }
    }

    /// A stable lowercase name, used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Telemetry => "telemetry",
            Channel::EvolutionTrigger => "evolution_trigger",
            Channel::EvolutionPlan => "evolution_plan",
            Channel::MutationReady => "mutation_ready",
            Channel::MutationApplied => "mutation_applied",
            Channel::MutationFailed => "mutation_failed",
            Channel::ParamsChanged => "params_changed",
            Channel::EvolutionForce => "evolution_force",
            Channel::FeedMessage => "feed_message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_is_the_only_coalescing_channel() {
        let coalescing: Vec<Channel> = [
            Channel::Telemetry,
            Channel::EvolutionTrigger,
            Channel::EvolutionPlan,
            Channel::MutationReady,
            Channel::MutationApplied,
            Channel::MutationFailed,
            Channel::ParamsChanged,
            Channel::EvolutionForce,
            Channel::FeedMessage,
        ]
        .into_iter()
        .filter(|c| c.policy() == ChannelPolicy::Coalescing)
        .collect();
        assert_eq!(coalescing, vec![Channel::Telemetry]);
    }
}
