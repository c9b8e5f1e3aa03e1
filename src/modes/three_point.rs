use std::cmp::Ordering;

use crate::constants::MAX_POINTS;
use crate::modes::owners_of;
use crate::point::ControlPoint;
use crate::round::RoundTimer;
use crate::types::{CaptureGates, GameConfig, GameEvent, RoundOutcome, Team};

const CENTER: usize = 1;

/// Bidirectional linear progression over three points: each side starts with
/// its home point, the center unlocks the push into enemy territory, and
/// holding the majority at the buzzer wins.
pub struct ThreePointMode {
    timer: RoundTimer,
    gates: [CaptureGates; MAX_POINTS],
    last_owner: [Team; MAX_POINTS],
    bonus_granted: [bool; MAX_POINTS],
    time_limit_ms: u64,
    bonus_ms: u64,
    extension_ms: u64,
    overtime: bool,
}

impl ThreePointMode {
    pub fn new(config: &GameConfig) -> Self {
        let mut mode = Self {
            timer: RoundTimer::new(),
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
        match index {
            0 => Team::Red,
            CENTER => Team::Nobody,
            2 => Team::Blue,
            _ => Team::Nobody,
        }
    }

    pub fn gates(&self, index: usize) -> CaptureGates {
        self.gates
            .get(index)
            .copied()
            .unwrap_or_else(CaptureGates::none)
    }

    pub fn attribute_unknown(&self, point_owner: Team, count: u32) -> (u32, u32) {
        match point_owner {
            Team::Red => (0, count),
            Team::Blue => (count, 0),
            _ => (0, 0),
        }
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
            if owners[i] != self.last_owner[i] {
                if !self.bonus_granted[i] && owners[i] != self.initial_owner(i) {
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

        let red_total = owners.iter().filter(|&&o| o == Team::Red).count();
        let blue_total = owners.iter().filter(|&&o| o == Team::Blue).count();
        if red_total == MAX_POINTS {
            self.overtime = false;
            self.timer.declare(RoundOutcome::RedVictory);
            events.push(GameEvent::Victory { team: Team::Red });
            return;
        }
        if blue_total == MAX_POINTS {
            self.overtime = false;
            self.timer.declare(RoundOutcome::BlueVictory);
            events.push(GameEvent::Victory { team: Team::Blue });
            return;
        }

        if self.remaining_ms(now_ms) == 0 {
            let pending = points.iter().any(|point| point.capturing().is_side());
            if pending {
                if !self.overtime {
                    self.overtime = true;
                    events.push(GameEvent::Overtime);
                }
            } else {
                self.overtime = false;
                match red_total.cmp(&blue_total) {
                    Ordering::Greater => {
                        self.timer.declare(RoundOutcome::RedVictory);
                        events.push(GameEvent::Victory { team: Team::Red });
                    }
                    Ordering::Less => {
                        self.timer.declare(RoundOutcome::BlueVictory);
                        events.push(GameEvent::Victory { team: Team::Blue });
                    }
                    Ordering::Equal => {
                        self.timer.declare(RoundOutcome::Stalemate);
                    }
                }
            }
        }
    }

    fn recompute_gates(&mut self, owners: &[Team; MAX_POINTS]) {
        let center = owners[CENTER];
        self.gates[0] = CaptureGates {
            red: true,
            blue: center == Team::Blue,
        };
        self.gates[CENTER] = CaptureGates::both();
        self.gates[2] = CaptureGates {
            red: center == Team::Red,
            blue: true,
        };
    }
}
