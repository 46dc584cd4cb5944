//! The Watcher Agent (spec.md §4.5): subscribes to `Telemetry`, applies the
//! three fixed anomaly rules, and emits `EvolutionTrigger`s subject to a
//! per-category cooldown and a circuit breaker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use genesis_bus::{Channel, EventBus};
use genesis_events::{Event, EvolutionTrigger, ProblemType, Severity, WorldContext};
use genesis_protocol::narration::{AgentTag, FeedMessage, TriggerMetadata};
use genesis_world::Snapshot;
use uuid::Uuid;

/// Thresholds and timing knobs for anomaly detection, cooldown, and the
/// circuit breaker, all defaulting to spec.md §4.5's stated values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatcherConfig {
    /// How many recent snapshots to retain.
    pub ring_size: usize,
    /// Seconds of silence required after a non-critical emission before
    /// the same problem category may fire again.
    pub cooldown_sec: u64,
    /// Window, in seconds, over which trigger emissions are counted for
    /// the circuit breaker.
    pub circuit_window_sec: u64,
    /// More than this many emissions inside `circuit_window_sec` opens the
    /// breaker.
    pub circuit_threshold: u32,
    /// How long, in seconds, the breaker stays open once tripped.
    pub circuit_pause_sec: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            ring_size: 5,
            cooldown_sec: 60,
            circuit_window_sec: 60,
            circuit_threshold: 5,
            circuit_pause_sec: 300,
        }
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Apply the three anomaly rules against one snapshot and current
/// population bounds, returning the single most severe hit, if any.
pub fn evaluate_anomaly(snapshot: &Snapshot, min_population: u64, max_entities: u64) -> Option<(ProblemType, Severity)> {
    let mut hits = Vec::new();

    if snapshot.mean_energy < 20.0 {
        let severity = if snapshot.mean_energy < 10.0 { Severity::High } else { Severity::Medium };
        hits.push((ProblemType::Starvation, severity));
    }

    let extinction_floor = (min_population as f64 * 1.5) as u64;
    if (snapshot.entity_count as u64) < extinction_floor {
        let severity = if (snapshot.entity_count as u64) < min_population { Severity::Critical } else { Severity::High };
        hits.push((ProblemType::ExtinctionRisk, severity));
    }

    let overpop_floor = (max_entities as f64 * 0.95) as u64;
    if (snapshot.entity_count as u64) > overpop_floor {
        let severity = if (snapshot.entity_count as u64) >= max_entities { Severity::High } else { Severity::Medium };
        hits.push((ProblemType::Overpopulation, severity));
    }

    hits.into_iter().max_by_key(|(_, severity)| *severity)
}

/// The Watcher's running state: the telemetry ring buffer, per-category
/// cooldown clocks, and the circuit breaker's trailing emission window.
pub struct Watcher {
    config: WatcherConfig,
    ring: VecDeque<Snapshot>,
    last_emission: HashMap<ProblemType, Instant>,
    recent_emissions: VecDeque<Instant>,
    breaker_open_until: Option<Instant>,
    min_population: u64,
    max_entities: u64,
}

impl Watcher {
    /// A fresh watcher against the engine's current population bounds.
    pub fn new(config: WatcherConfig, min_population: u64, max_entities: u64) -> Self {
        Watcher {
            config,
            ring: VecDeque::with_capacity(config.ring_size),
            last_emission: HashMap::new(),
            recent_emissions: VecDeque::new(),
            breaker_open_until: None,
            min_population,
            max_entities,
        }
    }

    fn remember(&mut self, snapshot: Snapshot) {
        if self.ring.len() == self.config.ring_size {
            self.ring.pop_front();
        }
        self.ring.push_back(snapshot);
    }

    fn breaker_is_open(&mut self, now: Instant) -> bool {
        match self.breaker_open_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.breaker_open_until = None;
                false
            }
            None => false,
        }
    }

    fn record_emission_and_maybe_trip_breaker(&mut self, now: Instant) -> bool {
        self.recent_emissions.push_back(now);
        let window = Duration::from_secs(self.config.circuit_window_sec);
        while let Some(front) = self.recent_emissions.front() {
            if now.duration_since(*front) > window {
                self.recent_emissions.pop_front();
            } else {
                break;
            }
        }
        if self.recent_emissions.len() as u32 > self.config.circuit_threshold {
            self.breaker_open_until = Some(now + Duration::from_secs(self.config.circuit_pause_sec));
            true
        } else {
            false
        }
    }

    /// Decide whether to emit given a fresh anomaly hit, updating cooldown
    /// and breaker state as a side effect. Returns `None` when the hit is
    /// suppressed by cooldown or the breaker.
    fn gate(&mut self, problem_type: ProblemType, severity: Severity) -> Option<Severity> {
        let now = Instant::now();

        if severity != Severity::Critical && self.breaker_is_open(now) {
            return None;
        }

        if severity != Severity::Critical {
            if let Some(last) = self.last_emission.get(&problem_type) {
                if now.duration_since(*last) < Duration::from_secs(self.config.cooldown_sec) {
                    return None;
                }
            }
        }

        self.last_emission.insert(problem_type, now);
        self.record_emission_and_maybe_trip_breaker(now);
        Some(severity)
    }

    /// Apply a just-received telemetry snapshot: remember it, evaluate the
    /// anomaly rules, and gate the result through cooldown and the breaker.
    /// Returns the trigger to publish, if any, and whether the breaker just
    /// tripped (so the caller can also narrate the pause).
    pub fn on_snapshot(&mut self, snapshot: Snapshot) -> (Option<EvolutionTrigger>, bool) {
        let entity_count = snapshot.entity_count;
        let mean_energy = snapshot.mean_energy;
        let known_traits: Vec<String> = Vec::new();
        let tick = snapshot.tick;
        self.remember(snapshot);

        let Some((problem_type, severity)) = self
            .ring
            .back()
            .and_then(|s| evaluate_anomaly(s, self.min_population, self.max_entities))
        else {
            return (None, false);
        };

        let breaker_was_closed = self.breaker_open_until.is_none();
        let Some(severity) = self.gate(problem_type, severity) else {
            return (None, false);
        };
        let just_tripped = breaker_was_closed && self.breaker_open_until.is_some();

        let trigger = EvolutionTrigger {
            cycle_id: Uuid::new_v4(),
            problem_type,
            severity,
            snapshot_key: tick,
            world_context: WorldContext { entity_count, mean_energy, known_traits },
            occurred_at: unix_seconds(),
        };
        (Some(trigger), just_tripped)
    }

    /// Build a synthetic `manual_test` trigger for an operator-forced
    /// evolution request, bypassing cooldown entirely.
    pub fn force_trigger(&self, reason: Option<String>, severity: Severity) -> (EvolutionTrigger, FeedMessage) {
        let world_context = self
            .ring
            .back()
            .map(|s| WorldContext {
                entity_count: s.entity_count,
                mean_energy: s.mean_energy,
                known_traits: Vec::new(),
            })
            .unwrap_or(WorldContext { entity_count: 0, mean_energy: 0.0, known_traits: Vec::new() });
        let trigger = EvolutionTrigger {
            cycle_id: Uuid::new_v4(),
            problem_type: ProblemType::ManualTest,
            severity,
            snapshot_key: self.ring.back().map(|s| s.tick).unwrap_or(0),
            world_context,
            occurred_at: unix_seconds(),
        };
        let message = FeedMessage::plain(
            AgentTag::Watcher,
            "evolution_forced",
            format!("operator forced an evolution cycle{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()),
            trigger.occurred_at,
        );
        (trigger, message)
    }

    /// Update the population bounds this watcher evaluates against,
    /// following an `ApplyParams` change to `min_population`/`max_entities`.
    pub fn set_population_bounds(&mut self, min_population: u64, max_entities: u64) {
        self.min_population = min_population;
        self.max_entities = max_entities;
    }
}

fn narration_for(trigger: &EvolutionTrigger) -> FeedMessage {
    let message = format!(
        "{} anomaly detected ({:?} severity): {} entities, mean energy {:.1}",
        trigger.problem_type.as_str(),
        trigger.severity,
        trigger.world_context.entity_count,
        trigger.world_context.mean_energy
    );
    let mut metadata = genesis_protocol::narration::NarrationMetadata::empty();
    metadata.cycle_id = Some(trigger.cycle_id.to_string());
    metadata.trigger = Some(TriggerMetadata {
        severity: format!("{:?}", trigger.severity).to_lowercase(),
        reason: None,
    });
    FeedMessage {
        agent: AgentTag::Watcher,
        action: "evolution_trigger".to_string(),
        message,
        timestamp: trigger.occurred_at,
        metadata: Some(metadata),
    }
}

/// Run the Watcher as a long-lived task: consume `Telemetry`,
/// `EvolutionForce`, and `ParamsChanged` events from `bus`, publishing
/// triggers and narration as the rules dictate. Returns when its bus
/// subscriptions are canceled.
pub async fn run(mut watcher: Watcher, bus: Arc<EventBus>) {
    let mut telemetry = bus.subscribe(Channel::Telemetry);
    let mut force = bus.subscribe(Channel::EvolutionForce);
    let mut params = bus.subscribe(Channel::ParamsChanged);

    loop {
        tokio::select! {
            event = telemetry.recv() => {
                let Some(Event::Telemetry(snapshot)) = event else { break };
                let (trigger, breaker_tripped) = watcher.on_snapshot(snapshot);
                if breaker_tripped {
                    let now = unix_seconds();
                    bus.narrate(FeedMessage::plain(
                        AgentTag::Watcher,
                        "circuit_breaker_tripped",
                        format!("more than {} triggers fired within {}s; suppressing non-critical triggers for {}s",
                            watcher_threshold(&watcher), watcher_window(&watcher), watcher_pause(&watcher)),
                        now,
                    )).await;
                }
                if let Some(trigger) = trigger {
                    let narration = narration_for(&trigger);
                    bus.trigger_evolution(trigger).await;
                    bus.narrate(narration).await;
                }
            }
            event = force.recv() => {
                let Some(Event::EvolutionForce(request)) = event else { break };
                let severity = request.severity.unwrap_or(Severity::High);
                let (trigger, message) = watcher.force_trigger(request.reason, severity);
                bus.trigger_evolution(trigger).await;
                bus.narrate(message).await;
            }
            event = params.recv() => {
                let Some(Event::ParamsChanged(change)) = event else { break };
                apply_population_param(&mut watcher, &change);
            }
        }
    }
}

fn apply_population_param(watcher: &mut Watcher, change: &genesis_events::ParamsChangedEvent) {
    match change.name.as_str() {
        "min_population" => {
            if let Some(v) = change.value.as_u64() {
                watcher.set_population_bounds(v, watcher.max_entities);
            }
        }
        "max_entities" => {
            if let Some(v) = change.value.as_u64() {
                watcher.set_population_bounds(watcher.min_population, v);
            }
        }
        _ => {}
    }
}

fn watcher_threshold(w: &Watcher) -> u32 {
    w.config.circuit_threshold
}
fn watcher_window(w: &Watcher) -> u64 {
    w.config.circuit_window_sec
}
fn watcher_pause(w: &Watcher) -> u64 {
    w.config.circuit_pause_sec
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tick: u64, entity_count: usize, mean_energy: f32) -> Snapshot {
        Snapshot {
            tick,
            wall_clock_millis: 0,
            entity_count,
            mean_energy,
            resource_count: 0,
            deaths_since_last: Default::default(),
            trait_diversity: 0,
            dominant_trait: None,
        }
    }

    #[test]
    fn starvation_rule_picks_high_below_ten() {
        let hit = evaluate_anomaly(&snapshot(1, 50, 5.0), 5, 200);
        assert_eq!(hit, Some((ProblemType::Starvation, Severity::High)));
    }

    #[test]
    fn starvation_rule_picks_medium_between_ten_and_twenty() {
        let hit = evaluate_anomaly(&snapshot(1, 50, 15.0), 5, 200);
        assert_eq!(hit, Some((ProblemType::Starvation, Severity::Medium)));
    }

    #[test]
    fn extinction_risk_is_critical_below_min_population() {
        let hit = evaluate_anomaly(&snapshot(1, 3, 50.0), 5, 200);
        assert_eq!(hit, Some((ProblemType::ExtinctionRisk, Severity::Critical)));
    }

    #[test]
    fn only_the_most_severe_rule_is_reported() {
        // both starvation (medium) and extinction risk (critical) fire; critical wins
        let hit = evaluate_anomaly(&snapshot(1, 3, 15.0), 5, 200);
        assert_eq!(hit, Some((ProblemType::ExtinctionRisk, Severity::Critical)));
    }

    #[test]
    fn cooldown_suppresses_a_repeat_non_critical_emission() {
        let mut watcher = Watcher::new(WatcherConfig::default(), 5, 200);
        let (first, _) = watcher.on_snapshot(snapshot(1, 50, 15.0));
        assert!(first.is_some());
        let (second, _) = watcher.on_snapshot(snapshot(2, 50, 15.0));
        assert!(second.is_none());
    }

    #[test]
    fn critical_severity_bypasses_cooldown() {
        let mut watcher = Watcher::new(WatcherConfig::default(), 5, 200);
        let (first, _) = watcher.on_snapshot(snapshot(1, 3, 50.0));
        assert!(first.is_some());
        let (second, _) = watcher.on_snapshot(snapshot(2, 3, 50.0));
        assert!(second.is_some());
        assert_eq!(second.unwrap().severity, Severity::Critical);
    }

    #[test]
    fn force_trigger_always_tags_manual_test() {
        let watcher = Watcher::new(WatcherConfig::default(), 5, 200);
        let (trigger, _) = watcher.force_trigger(Some("smoke test".to_string()), Severity::High);
        assert_eq!(trigger.problem_type, ProblemType::ManualTest);
    }
}
