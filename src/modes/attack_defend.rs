use crate::constants::MAX_POINTS;
use crate::modes::owners_of;
use crate::point::ControlPoint;
use crate::round::RoundTimer;
use crate::types::{CaptureGates, GameConfig, GameEvent, RoundOutcome, Team};

/// One-way linear progression: RED defends a chain of points, BLUE must take
/// them in order and sweeps to win before the clock runs out.
pub struct AttackDefendMode {
    timer: RoundTimer,
    used: [bool; MAX_POINTS],
    gates: [CaptureGates; MAX_POINTS],
    last_owner: [Team; MAX_POINTS],
    bonus_granted: [bool; MAX_POINTS],
    time_limit_ms: u64,
    bonus_ms: u64,
    extension_ms: u64,
    overtime: bool,
}

impl AttackDefendMode {
    pub fn new(config: &GameConfig) -> Self {
        let mut mode = Self {
            timer: RoundTimer::new(),
            used: config.used,
            gates: [CaptureGates::none(); MAX_POINTS],
            last_owner: [Team::Nobody; MAX_POINTS],
            bonus_granted: [false; MAX_POINTS],
            time_limit_ms: config.time_limit_ms,
            bonus_ms: config.bonus_ms,
            extension_ms: 0,
            overtime: false,
        };
        for i in 0..MAX_POINTS {
            mode.last_owner[i] = mode.initial_owner(i);
        }
        let owners = mode.last_owner;
        mode.recompute_gates(&owners);
        mode
    }

    pub fn initial_owner(&self, index: usize) -> Team {
        if self.used.get(index).copied().unwrap_or(false) {
            Team::Red
        } else {
            Team::Nobody
        }
    }

    pub fn used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    pub fn gates(&self, index: usize) -> CaptureGates {
        self.gates
            .get(index)
            .copied()
            .unwrap_or_else(CaptureGates::none)
    }

    pub fn attribute_unknown(&self, _point_owner: Team, count: u32) -> (u32, u32) {
        (0, count)
    }

    pub fn start(&mut self, now_ms: u64) {
        self.timer.start(now_ms);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        (self.time_limit_ms + self.extension_ms).saturating_sub(self.timer.elapsed_ms(now_ms))
    }

    pub fn extension_ms(&self) -> u64 {
        self.extension_ms
    }

    pub fn overtime(&self) -> bool {
        self.overtime
    }

    pub fn evaluate(
        &mut self,
        points: &[ControlPoint],
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if self.timer.is_over() {
            return;
        }
        let owners = owners_of(points);
        self.timer.accrue_tick(&owners, now_ms);

        for i in 0..MAX_POINTS {
            if self.used[i] && owners[i] != self.last_owner[i] {
                if owners[i] == Team::Blue && !self.bonus_granted[i] {
                    self.bonus_granted[i] = true;
                    if self.bonus_ms > 0 {
                        self.extension_ms += self.bonus_ms;
                        events.push(GameEvent::TimeExtended {
                            seconds: self.bonus_ms / 1000,
                        });
                    }
                }
                self.last_owner[i] = owners[i];
            }
        }
        self.recompute_gates(&owners);

        let swept = (0..MAX_POINTS)
            .filter(|&i| self.used[i])
            .all(|i| owners[i] == Team::Blue);
        if swept {
            self.overtime = false;
            self.timer.declare(RoundOutcome::BlueVictory);
            events.push(GameEvent::Victory { team: Team::Blue });
            return;
        }

        if self.remaining_ms(now_ms) == 0 {
            let pending = points
                .iter()
                .enumerate()
                .any(|(i, point)| self.used[i] && point.capturing() == Team::Blue);
            if pending {
                if !self.overtime {
                    self.overtime = true;
                    events.push(GameEvent::Overtime);
                }
            } else {
                self.overtime = false;
                self.timer.declare(RoundOutcome::RedVictory);
                events.push(GameEvent::Victory { team: Team::Red });
            }
        }
    }

    fn recompute_gates(&mut self, owners: &[Team; MAX_POINTS]) {
        for i in 0..MAX_POINTS {
            self.gates[i] = if !self.used[i] {
                CaptureGates::none()
            } else {
                let unlocked = (0..i)
                    .filter(|&j| self.used[j])
                    .all(|j| owners[j] == Team::Blue);
                CaptureGates {
                    red: false,
                    blue: unlocked,
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::Proximity;
    use crate::types::ModeKind;

    fn config(used: [bool; MAX_POINTS], bonus_ms: u64) -> GameConfig {
        GameConfig {
            mode: ModeKind::AttackDefend,
            capture_ms: 5_000,
            time_limit_ms: 60_000,
            start_delay_ms: 0,
            bonus_ms,
            used,
            ..GameConfig::default()
        }
    }

    fn points_with(owners: [Team; MAX_POINTS]) -> Vec<ControlPoint> {
        owners
            .iter()
            .enumerate()
            .map(|(i, &owner)| {
                let mut point = ControlPoint::new(i, 5_000);
                point.reset(owner, 5_000);
                point
            })
            .collect()
    }

    #[test]
    fn blue_gates_open_in_chain_order() {
        let mut mode = AttackDefendMode::new(&config([true; MAX_POINTS], 0));
        mode.start(0);
        let mut events = Vec::new();

        let mut points = points_with([Team::Red, Team::Red, Team::Red]);
        mode.evaluate(&points, 0, &mut events);
        assert!(mode.gates(0).blue);
        assert!(!mode.gates(1).blue);
        assert!(!mode.gates(2).blue);

        points[0].reset(Team::Blue, 5_000);
        mode.evaluate(&points, 1_000, &mut events);
        assert!(mode.gates(1).blue);
        assert!(!mode.gates(2).blue);

        points[1].reset(Team::Blue, 5_000);
        mode.evaluate(&points, 2_000, &mut events);
        assert!(mode.gates(2).blue);
    }

    #[test]
    fn red_gate_never_opens() {
        let mut mode = AttackDefendMode::new(&config([true; MAX_POINTS], 0));
        mode.start(0);
        let mut events = Vec::new();

        let points = points_with([Team::Blue, Team::Blue, Team::Red]);
        mode.evaluate(&points, 1_000, &mut events);
        for i in 0..MAX_POINTS {
            assert!(!mode.gates(i).red);
        }
    }

    #[test]
    fn bonus_is_granted_once_per_point() {
        let mut mode = AttackDefendMode::new(&config([true; MAX_POINTS], 30_000));
        mode.start(0);
        let mut events = Vec::new();

        let mut points = points_with([Team::Blue, Team::Red, Team::Red]);
        mode.evaluate(&points, 1_000, &mut events);
        assert_eq!(mode.extension_ms(), 30_000);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TimeExtended { seconds: 30 })));

        events.clear();
        points[0].reset(Team::Red, 5_000);
        mode.evaluate(&points, 2_000, &mut events);
        points[0].reset(Team::Blue, 5_000);
        mode.evaluate(&points, 3_000, &mut events);
        assert_eq!(mode.extension_ms(), 30_000);
        assert!(events.is_empty());
    }

    #[test]
    fn sweeping_all_used_points_wins_immediately() {
        let mut mode = AttackDefendMode::new(&config([true, true, false], 0));
        mode.start(0);
        let mut events = Vec::new();

        let points = points_with([Team::Blue, Team::Blue, Team::Nobody]);
        mode.evaluate(&points, 10_000, &mut events);
        assert_eq!(mode.timer().outcome(), Some(RoundOutcome::BlueVictory));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Victory { team: Team::Blue })));
    }

    #[test]
    fn exhausted_clock_without_sweep_is_red_victory() {
        let mut mode = AttackDefendMode::new(&config([true; MAX_POINTS], 0));
        mode.start(0);
        let mut events = Vec::new();

        let points = points_with([Team::Blue, Team::Red, Team::Red]);
        mode.evaluate(&points, 59_000, &mut events);
        assert_eq!(mode.timer().outcome(), None);

        mode.evaluate(&points, 60_000, &mut events);
        assert_eq!(mode.timer().outcome(), Some(RoundOutcome::RedVictory));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Victory { team: Team::Red })));
    }

    #[test]
    fn pending_blue_capture_holds_red_victory_back() {
        let mut mode = AttackDefendMode::new(&config([true, false, false], 0));
        mode.start(0);
        let mut events = Vec::new();
        let mut points = points_with([Team::Red, Team::Nobody, Team::Nobody]);
        let mut prox = Proximity::new(2_000);

        prox.observe_count(Team::Blue, 1, 58_000);
        points[0].update(&prox, mode.gates(0), 58_000, &mut events);
        mode.evaluate(&points, 58_000, &mut events);
        assert_eq!(points[0].capturing(), Team::Blue);

        prox.observe_count(Team::Blue, 1, 60_000);
        points[0].update(&prox, mode.gates(0), 60_000, &mut events);
        mode.evaluate(&points, 60_000, &mut events);
        assert_eq!(mode.timer().outcome(), None);
        assert!(mode.overtime());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::Overtime))
                .count(),
            1
        );

        mode.evaluate(&points, 61_000, &mut events);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::Overtime))
                .count(),
            1
        );

        for now in [62_000u64, 63_000, 64_000, 65_000] {
            points[0].update(&prox, mode.gates(0), now, &mut events);
            mode.evaluate(&points, now, &mut events);
        }
        assert_eq!(points[0].capturing(), Team::Nobody);
        assert_eq!(mode.timer().outcome(), Some(RoundOutcome::RedVictory));
        assert!(!mode.overtime());
    }

    #[test]
    fn single_point_capture_extends_and_wins() {
        let mut mode = AttackDefendMode::new(&GameConfig {
            mode: ModeKind::AttackDefend,
            capture_ms: 5_000,
            time_limit_ms: 20_000,
            start_delay_ms: 0,
            bonus_ms: 10_000,
            used: [true, false, false],
            ..GameConfig::default()
        });
        mode.start(0);
        let mut events = Vec::new();
        let mut points = points_with([Team::Red, Team::Nobody, Team::Nobody]);
        let mut prox = Proximity::new(2_000);

        for now in (0..=4_000u64).step_by(1_000) {
            prox.observe_count(Team::Blue, 1, now);
            points[0].update(&prox, mode.gates(0), now, &mut events);
            mode.evaluate(&points, now, &mut events);
        }
        assert_eq!(mode.remaining_ms(4_000), 16_000);
        assert_eq!(mode.timer().outcome(), None);

        prox.observe_count(Team::Blue, 1, 5_000);
        points[0].update(&prox, mode.gates(0), 5_000, &mut events);
        mode.evaluate(&points, 5_000, &mut events);

        assert_eq!(points[0].owner(), Team::Blue);
        assert_eq!(mode.extension_ms(), 10_000);
        assert_eq!(mode.remaining_ms(5_000), 25_000);
        assert_eq!(mode.timer().outcome(), Some(RoundOutcome::BlueVictory));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TimeExtended { seconds: 10 })));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Victory { team: Team::Blue })));
    }
}
