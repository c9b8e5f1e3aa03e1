use std::sync::Arc;

use crate::announce::{Announcer, EventSink};
use crate::clock::Clock;
use crate::constants::{ENDING_MILESTONES_S, MAX_POINTS, STARTING_MILESTONES_S};
use crate::modes::GameMode;
use crate::point::ControlPoint;
use crate::proximity::Proximity;
use crate::sensing::{ManualOverrides, PresenceSource};
use crate::types::{
    GameConfig, GameEvent, Phase, PointView, RoundSummary, Snapshot, StartError, Team,
};

/// Long-lived backend driver. Owns the phase machine, merges sensor and
/// override input into per-point proximity, advances the capture automatons
/// and lets the active mode decide gates, bonuses and the outcome. All
/// methods are synchronous state transitions; the caller provides the tick
/// cadence.
pub struct GameEngine {
    config: GameConfig,
    phase: Phase,
    countdown_started_ms: Option<u64>,
    points: Vec<ControlPoint>,
    proximity: Vec<Proximity>,
    mode: Option<GameMode>,
    announcer: Announcer,
    events: Vec<GameEvent>,
    overrides: ManualOverrides,
    source: Arc<dyn PresenceSource>,
    clock: Arc<dyn Clock>,
    last_remaining_s: Option<u64>,
    last_countdown_s: Option<u64>,
    summary: Option<RoundSummary>,
}

impl GameEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        source: Arc<dyn PresenceSource>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let config = GameConfig::default();
        let points = (0..MAX_POINTS)
            .map(|i| ControlPoint::new(i, config.capture_ms))
            .collect();
        let proximity = (0..MAX_POINTS)
            .map(|_| Proximity::new(config.presence_decay_ms))
            .collect();
        Self {
            config,
            phase: Phase::Idle,
            countdown_started_ms: None,
            points,
            proximity,
            mode: None,
            announcer: Announcer::new(sink),
            events: Vec::new(),
            overrides: ManualOverrides::default(),
            source,
            clock,
            last_remaining_s: None,
            last_countdown_s: None,
            summary: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn start_round(&mut self, config: GameConfig) -> Result<(), StartError> {
        if self.phase != Phase::Idle {
            return Err(StartError::RoundActive);
        }
        let config = config.normalized();
        let mode = GameMode::new(&config)?;
        let now_ms = self.clock.now_ms();

        for (i, point) in self.points.iter_mut().enumerate() {
            point.reset(mode.initial_owner(i), config.capture_ms);
        }
        for prox in &mut self.proximity {
            prox.reset(config.presence_decay_ms);
        }
        self.announcer.reset();
        self.summary = None;
        self.last_remaining_s = None;
        self.last_countdown_s = None;
        self.config = config;
        self.mode = Some(mode);

        if config.start_delay_ms > 0 {
            self.phase = Phase::Countdown;
            self.countdown_started_ms = Some(now_ms);
            tracing::info!(
                mode = ?config.mode,
                delay_ms = config.start_delay_ms,
                "round countdown started"
            );
        } else {
            self.begin_running(now_ms);
        }
        Ok(())
    }

    pub fn stop_round(&mut self) {
        if matches!(self.phase, Phase::Countdown | Phase::Running) {
            if let Some(mode) = self.mode.as_mut() {
                mode.cancel();
            }
            let now_ms = self.clock.now_ms();
            let event = GameEvent::Cancelled;
            self.announcer.announce(&event, now_ms);
            self.events.push(event);
            tracing::info!("round cancelled");
        }
        self.clear_round();
    }

    pub fn reset(&mut self) {
        self.stop_round();
    }

    pub fn set_override_enabled(&mut self, enabled: bool) {
        self.overrides.enabled = enabled;
    }

    pub fn set_override(&mut self, index: usize, team: Team, active: bool) {
        if index >= MAX_POINTS {
            return;
        }
        match team {
            Team::Red => self.overrides.points[index].red = active,
            Team::Blue => self.overrides.points[index].blue = active,
            _ => {}
        }
    }

    pub fn overrides(&self) -> ManualOverrides {
        self.overrides
    }

    pub fn step(&mut self) {
        let now_ms = self.clock.now_ms();
        match self.phase {
            Phase::Idle | Phase::Ended => {}
            Phase::Countdown => self.step_countdown(now_ms),
            Phase::Running => self.step_running(now_ms),
        }
    }

    pub fn take_summary(&mut self) -> Option<RoundSummary> {
        self.summary.take()
    }

    pub fn snapshot(&mut self, include_events: bool) -> Snapshot {
        let now_ms = self.clock.now_ms();
        let (elapsed, remaining, extension, overtime, outcome, red_hold, blue_hold) =
            match &self.mode {
                Some(mode) => (
                    mode.timer().elapsed_seconds(now_ms),
                    mode.remaining_ms(now_ms).div_ceil(1000),
                    mode.extension_ms() / 1000,
                    mode.overtime(),
                    mode.timer().outcome(),
                    mode.timer().red_hold_ms() / 1000,
                    mode.timer().blue_hold_ms() / 1000,
                ),
                None => (0, 0, 0, false, None, 0, 0),
            };
        let countdown_remaining = match (self.phase, self.countdown_started_ms) {
            (Phase::Countdown, Some(started)) => self
                .config
                .start_delay_ms
                .saturating_sub(now_ms.saturating_sub(started))
                .div_ceil(1000),
            _ => 0,
        };
        let points = self
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| PointView {
                index: i,
                used: match &self.mode {
                    Some(mode) => mode.used(i),
                    None => self.config.used[i],
                },
                owner: point.owner(),
                on: point.on(),
                capturing: point.capturing(),
                contested: point.contested(),
                progress_percent: point.progress_percent(),
                red_count: self.proximity[i].last_count(Team::Red, now_ms),
                blue_count: self.proximity[i].last_count(Team::Blue, now_ms),
            })
            .collect();

        let snapshot = Snapshot {
            phase: self.phase,
            mode: self.config.mode,
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            extension_seconds: extension,
            countdown_remaining_seconds: countdown_remaining,
            overtime,
            outcome,
            points,
            red_hold_seconds: red_hold,
            blue_hold_seconds: blue_hold,
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    fn begin_running(&mut self, now_ms: u64) {
        self.phase = Phase::Running;
        self.countdown_started_ms = None;
        if let Some(mode) = self.mode.as_mut() {
            mode.start(now_ms);
        }
        let event = GameEvent::GameStarted;
        self.announcer.announce(&event, now_ms);
        self.events.push(event);
        tracing::info!(mode = ?self.config.mode, "round started");
    }

    fn clear_round(&mut self) {
        self.mode = None;
        self.phase = Phase::Idle;
        self.countdown_started_ms = None;
        self.summary = None;
        self.last_remaining_s = None;
        self.last_countdown_s = None;
        for point in &mut self.points {
            point.reset(Team::Nobody, self.config.capture_ms);
        }
        for prox in &mut self.proximity {
            prox.reset(self.config.presence_decay_ms);
        }
    }

    fn step_countdown(&mut self, now_ms: u64) {
        let started = match self.countdown_started_ms {
            Some(started) => started,
            None => return,
        };
        let elapsed = now_ms.saturating_sub(started);
        if elapsed >= self.config.start_delay_ms {
            self.begin_running(now_ms);
            return;
        }

        let remaining_s = (self.config.start_delay_ms - elapsed).div_ceil(1000);
        let prev = self.last_countdown_s.unwrap_or(u64::MAX);
        let crossed = STARTING_MILESTONES_S
            .iter()
            .filter(|&&m| prev > m && remaining_s <= m)
            .next_back();
        if let Some(&milestone) = crossed {
            let event = GameEvent::StartingIn { seconds: milestone };
            self.announcer.announce(&event, now_ms);
            self.events.push(event);
        }
        self.last_countdown_s = Some(remaining_s);
    }

    fn step_running(&mut self, now_ms: u64) {
        let overrides = self.overrides;
        let frame = self.source.sample();
        let mut tick_events = Vec::new();

        let mode = match self.mode.as_mut() {
            Some(mode) => mode,
            None => return,
        };

        for i in 0..MAX_POINTS {
            if !mode.used(i) {
                continue;
            }
            // Reported counts are not trusted to stay small; a hostile or
            // glitching sensor must not be able to wrap the merge.
            let mut red = 0u32;
            let mut blue = 0u32;
            if let Some(frame) = &frame {
                let counts = frame.points[i];
                red = red.saturating_add(counts.red);
                blue = blue.saturating_add(counts.blue);
                let (extra_red, extra_blue) =
                    mode.attribute_unknown(self.points[i].owner(), counts.unknown);
                red = red.saturating_add(extra_red);
                blue = blue.saturating_add(extra_blue);
            }
            if overrides.active(i, Team::Red) {
                red = red.saturating_add(1);
            }
            if overrides.active(i, Team::Blue) {
                blue = blue.saturating_add(1);
            }
            self.proximity[i].observe_count(Team::Red, red, now_ms);
            self.proximity[i].observe_count(Team::Blue, blue, now_ms);
        }

        for i in 0..MAX_POINTS {
            if !mode.used(i) {
                continue;
            }
            self.points[i].update(&self.proximity[i], mode.gates(i), now_ms, &mut tick_events);
        }

        mode.evaluate(&self.points, now_ms, &mut tick_events);

        if mode.timer().outcome().is_none() {
            let remaining_s = mode.remaining_ms(now_ms).div_ceil(1000);
            let prev = match self.last_remaining_s {
                Some(prev) => prev,
                None => remaining_s,
            };
            let crossed = ENDING_MILESTONES_S
                .iter()
                .filter(|&&m| prev > m && remaining_s <= m && remaining_s > 0)
                .next_back();
            if let Some(&milestone) = crossed {
                tick_events.push(GameEvent::EndingIn { seconds: milestone });
            }
            self.last_remaining_s = Some(remaining_s);
        }

        if let Some(outcome) = mode.timer().outcome() {
            self.summary = Some(RoundSummary {
                mode: mode.kind(),
                outcome,
                duration_ms: mode.timer().elapsed_ms(now_ms),
                extension_ms: mode.extension_ms(),
                red_hold_ms: mode.timer().red_hold_ms(),
                blue_hold_ms: mode.timer().blue_hold_ms(),
                used_points: (0..MAX_POINTS).filter(|&i| mode.used(i)).count(),
                final_owners: self.points.iter().map(|p| p.owner()).collect(),
            });
            self.phase = Phase::Ended;
            tracing::info!(?outcome, "round ended");
        }

        for event in &tick_events {
            self.announcer.announce(event, now_ms);
        }
        self.events.append(&mut tick_events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::CollectorSink;
    use crate::clock::ManualClock;
    use crate::sensing::{PointCounts, PresenceFrame, SharedPresenceSource};
    use crate::types::{ModeKind, RoundOutcome};

    fn scenario_config() -> GameConfig {
        GameConfig {
            mode: ModeKind::AttackDefend,
            capture_ms: 5_000,
            time_limit_ms: 20_000,
            start_delay_ms: 0,
            bonus_ms: 10_000,
            presence_decay_ms: 2_000,
            used: [true, false, false],
        }
    }

    fn test_engine() -> (
        GameEngine,
        Arc<ManualClock>,
        Arc<SharedPresenceSource>,
        CollectorSink,
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let source = Arc::new(SharedPresenceSource::new());
        let sink = CollectorSink::new();
        let engine = GameEngine::new(clock.clone(), source.clone(), Box::new(sink.clone()));
        (engine, clock, source, sink)
    }

    fn frame(points: [(u32, u32, u32); MAX_POINTS]) -> PresenceFrame {
        let mut frame = PresenceFrame::default();
        for (i, (red, blue, unknown)) in points.into_iter().enumerate() {
            frame.points[i] = PointCounts { red, blue, unknown };
        }
        frame
    }

    #[test]
    fn countdown_announces_and_hands_off_to_running() {
        let (mut engine, clock, _source, _sink) = test_engine();
        let config = GameConfig {
            start_delay_ms: 10_000,
            ..scenario_config()
        };
        engine.start_round(config).unwrap();
        assert_eq!(engine.phase(), Phase::Countdown);

        engine.step();
        let snapshot = engine.snapshot(true);
        assert_eq!(snapshot.countdown_remaining_seconds, 10);
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::StartingIn { seconds: 10 })));

        clock.set(5_500);
        engine.step();
        let snapshot = engine.snapshot(true);
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::StartingIn { seconds: 5 })));

        clock.set(10_000);
        engine.step();
        assert_eq!(engine.phase(), Phase::Running);
        let snapshot = engine.snapshot(true);
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::GameStarted)));
    }

    #[test]
    fn invalid_config_leaves_engine_idle() {
        let (mut engine, _clock, _source, _sink) = test_engine();
        let config = GameConfig {
            used: [true, false, true],
            ..scenario_config()
        };
        assert!(engine.start_round(config).is_err());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn start_is_rejected_while_a_round_is_active() {
        let (mut engine, _clock, _source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        assert_eq!(
            engine.start_round(scenario_config()),
            Err(StartError::RoundActive)
        );
    }

    #[test]
    fn single_point_scenario_extends_then_wins() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        assert_eq!(engine.phase(), Phase::Running);

        for now in (0..=4_000u64).step_by(1_000) {
            clock.set(now);
            source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
            engine.step();
        }
        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.remaining_seconds, 16);
        assert_eq!(snapshot.outcome, None);

        clock.set(5_000);
        source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
        engine.step();

        let snapshot = engine.snapshot(true);
        assert_eq!(engine.phase(), Phase::Ended);
        assert_eq!(snapshot.outcome, Some(RoundOutcome::BlueVictory));
        assert_eq!(snapshot.remaining_seconds, 25);
        assert_eq!(snapshot.extension_seconds, 10);
        assert_eq!(snapshot.points[0].owner, Team::Blue);
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::TimeExtended { seconds: 10 })));
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::Victory { team: Team::Blue })));
    }

    #[test]
    fn victory_is_not_re_emitted_after_the_round_ends() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        for now in (0..=5_000u64).step_by(1_000) {
            clock.set(now);
            source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
            engine.step();
        }
        clock.set(6_000);
        engine.step();
        clock.set(7_000);
        engine.step();

        let snapshot = engine.snapshot(true);
        assert_eq!(
            snapshot
                .events
                .iter()
                .filter(|e| matches!(e, GameEvent::Victory { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn manual_override_supplies_presence() {
        let (mut engine, clock, _source, _sink) = test_engine();
        let config = GameConfig {
            capture_ms: 2_000,
            bonus_ms: 0,
            ..scenario_config()
        };
        engine.start_round(config).unwrap();
        engine.set_override_enabled(true);
        engine.set_override(0, Team::Blue, true);

        for now in (0..=2_000u64).step_by(500) {
            clock.set(now);
            engine.step();
        }
        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].owner, Team::Blue);
        assert_eq!(snapshot.outcome, Some(RoundOutcome::BlueVictory));
    }

    #[test]
    fn ambiguous_presence_goes_to_blue_in_attack_defend() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();

        clock.set(1_000);
        source.publish(frame([(0, 0, 2), (0, 0, 0), (0, 0, 0)]));
        engine.step();

        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].blue_count, 2);
        assert_eq!(snapshot.points[0].red_count, 0);
        assert_eq!(snapshot.points[0].capturing, Team::Blue);
    }

    #[test]
    fn ambiguous_presence_goes_to_non_owner_in_three_point() {
        let (mut engine, clock, source, _sink) = test_engine();
        let config = GameConfig {
            mode: ModeKind::ThreePoint,
            start_delay_ms: 0,
            ..GameConfig::default()
        };
        engine.start_round(config).unwrap();

        clock.set(1_000);
        source.publish(frame([(0, 0, 2), (0, 0, 3), (0, 0, 4)]));
        engine.step();

        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].blue_count, 2);
        assert_eq!(snapshot.points[2].red_count, 4);
        assert_eq!(snapshot.points[1].red_count, 0);
        assert_eq!(snapshot.points[1].blue_count, 0);
    }

    #[test]
    fn extreme_sensor_counts_saturate_instead_of_wrapping() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        engine.set_override_enabled(true);
        engine.set_override(0, Team::Red, true);
        engine.set_override(0, Team::Blue, true);

        clock.set(1_000);
        source.publish(frame([(u32::MAX, 0, u32::MAX), (0, 0, 0), (0, 0, 0)]));
        engine.step();

        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].red_count, u32::MAX);
        assert_eq!(snapshot.points[0].blue_count, u32::MAX);
        assert_eq!(snapshot.points[0].on, Team::Both);
        assert!(snapshot.points[0].contested);
    }

    #[test]
    fn missing_sensor_frames_decay_presence() {
        let (mut engine, clock, source, _sink) = test_engine();
        let config = GameConfig {
            bonus_ms: 0,
            time_limit_ms: 60_000,
            ..scenario_config()
        };
        engine.start_round(config).unwrap();

        clock.set(1_000);
        source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
        engine.step();
        assert_eq!(engine.snapshot(false).points[0].on, Team::Blue);

        for now in [2_000u64, 3_000, 4_000] {
            clock.set(now);
            engine.step();
        }
        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].on, Team::Nobody);
        assert_eq!(snapshot.points[0].capturing, Team::Nobody);
        assert_eq!(snapshot.points[0].progress_percent, 0.0);
    }

    #[test]
    fn stop_round_cancels_and_clears() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        clock.set(1_000);
        source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
        engine.step();

        engine.stop_round();
        assert_eq!(engine.phase(), Phase::Idle);
        let snapshot = engine.snapshot(true);
        assert!(snapshot
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::Cancelled)));
        assert_eq!(snapshot.points[0].owner, Team::Nobody);
        assert_eq!(snapshot.outcome, None);

        assert!(engine.start_round(scenario_config()).is_ok());
    }

    #[test]
    fn summary_is_taken_once() {
        let (mut engine, clock, source, _sink) = test_engine();
        engine.start_round(scenario_config()).unwrap();
        for now in (0..=5_000u64).step_by(1_000) {
            clock.set(now);
            source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
            engine.step();
        }

        let summary = engine.take_summary().unwrap();
        assert_eq!(summary.outcome, RoundOutcome::BlueVictory);
        assert_eq!(summary.duration_ms, 5_000);
        assert_eq!(summary.extension_ms, 10_000);
        assert_eq!(summary.used_points, 1);
        assert_eq!(summary.final_owners[0], Team::Blue);
        assert!(engine.take_summary().is_none());

        engine.reset();
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn three_point_push_through_center_sweeps() {
        let (mut engine, clock, source, _sink) = test_engine();
        let config = GameConfig {
            mode: ModeKind::ThreePoint,
            capture_ms: 1_000,
            time_limit_ms: 60_000,
            start_delay_ms: 0,
            bonus_ms: 0,
            presence_decay_ms: 2_000,
            used: [true; MAX_POINTS],
        };
        engine.start_round(config).unwrap();

        let mut now = 0u64;
        for _ in 0..=2 {
            clock.set(now);
            source.publish(frame([(0, 0, 0), (0, 1, 0), (0, 0, 0)]));
            engine.step();
            now += 500;
        }
        assert_eq!(engine.snapshot(false).points[1].owner, Team::Blue);

        for _ in 0..=3 {
            clock.set(now);
            source.publish(frame([(0, 1, 0), (0, 0, 0), (0, 0, 0)]));
            engine.step();
            now += 500;
        }
        let snapshot = engine.snapshot(false);
        assert_eq!(snapshot.points[0].owner, Team::Blue);
        assert_eq!(snapshot.outcome, Some(RoundOutcome::BlueVictory));
        assert_eq!(engine.phase(), Phase::Ended);
    }
}
