use crate::proximity::Proximity;
use crate::types::{CaptureGates, GameEvent, Team};

/// One control point's capture automaton. Ownership only changes when a
/// capture completes; gates are policy inputs recomputed by the mode, never
/// stored here.
#[derive(Clone, Debug)]
pub struct ControlPoint {
    index: usize,
    owner: Team,
    on: Team,
    capturing: Team,
    value_ms: u64,
    contested: bool,
    contest_emitted: bool,
    capture_threshold_ms: u64,
    last_update_ms: Option<u64>,
}

impl ControlPoint {
    pub fn new(index: usize, capture_threshold_ms: u64) -> Self {
        Self {
            index,
            owner: Team::Nobody,
            on: Team::Nobody,
            capturing: Team::Nobody,
            value_ms: 0,
            contested: false,
            contest_emitted: false,
            capture_threshold_ms,
            last_update_ms: None,
        }
    }

    pub fn reset(&mut self, owner: Team, capture_threshold_ms: u64) {
        debug_assert!(capture_threshold_ms > 0);
        debug_assert!(owner != Team::Both);
        self.owner = owner;
        self.on = Team::Nobody;
        self.capturing = Team::Nobody;
        self.value_ms = 0;
        self.contested = false;
        self.contest_emitted = false;
        self.capture_threshold_ms = capture_threshold_ms;
        self.last_update_ms = None;
    }

    pub fn update(
        &mut self,
        presence: &Proximity,
        gates: CaptureGates,
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let red_on = presence.is_close(Team::Red, now_ms);
        let blue_on = presence.is_close(Team::Blue, now_ms);

        self.on = match (red_on, blue_on) {
            (true, false) => Team::Red,
            (false, true) => Team::Blue,
            (true, true) => Team::Both,
            (false, false) => Team::Nobody,
        };

        self.contested = self.on == Team::Both;
        if self.on == Team::Both {
            if !self.contest_emitted {
                self.contest_emitted = true;
                events.push(GameEvent::Contested { point: self.index });
            }
        } else if self.on == Team::Nobody {
            self.contest_emitted = false;
        }

        if self.capturing == Team::Nobody
            && self.on.is_side()
            && self.on != self.owner
            && gates.allows(self.on)
        {
            self.capturing = self.on;
            events.push(GameEvent::CaptureStarted {
                point: self.index,
                team: self.on,
            });
        }

        let elapsed_ms = match self.last_update_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => 0,
        };

        if self.on.is_side() && self.on == self.capturing {
            self.value_ms = (self.value_ms + elapsed_ms).min(self.capture_threshold_ms);
        } else if self.on != Team::Both {
            self.value_ms = self.value_ms.saturating_sub(elapsed_ms);
            if self.value_ms == 0 {
                self.capturing = Team::Nobody;
            }
        }

        if self.value_ms >= self.capture_threshold_ms {
            debug_assert!(self.capturing.is_side());
            self.owner = self.capturing;
            self.capturing = Team::Nobody;
            self.value_ms = 0;
            events.push(GameEvent::Captured {
                point: self.index,
                team: self.owner,
            });
        }

        self.last_update_ms = Some(now_ms);

        debug_assert!(self.value_ms <= self.capture_threshold_ms);
        debug_assert!(self.capturing != Team::Nobody || self.value_ms == 0);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn owner(&self) -> Team {
        self.owner
    }

    pub fn on(&self) -> Team {
        self.on
    }

    pub fn capturing(&self) -> Team {
        self.capturing
    }

    pub fn contested(&self) -> bool {
        self.contested
    }

    pub fn value_ms(&self) -> u64 {
        self.value_ms
    }

    pub fn progress_percent(&self) -> f32 {
        if self.capture_threshold_ms == 0 {
            return 0.0;
        }
        self.value_ms as f32 / self.capture_threshold_ms as f32 * 100.0
    }
}
