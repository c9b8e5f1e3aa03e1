mod attack_defend;
mod three_point;

pub use attack_defend::AttackDefendMode;
pub use three_point::ThreePointMode;

use crate::constants::MAX_POINTS;
use crate::point::ControlPoint;
use crate::round::RoundTimer;
use crate::types::{CaptureGates, ConfigError, GameConfig, GameEvent, ModeKind, Team};

/// Active orchestration policy for one round. Owns the round timer, recomputes
/// capture gates after every ownership change and decides victory, overtime
/// and time extensions.
pub enum GameMode {
    AttackDefend(AttackDefendMode),
    ThreePoint(ThreePointMode),
}

impl GameMode {
    pub fn new(config: &GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        match config.mode {
            ModeKind::AttackDefend => Ok(Self::AttackDefend(AttackDefendMode::new(config))),
            ModeKind::ThreePoint => Ok(Self::ThreePoint(ThreePointMode::new(config))),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::AttackDefend(_) => ModeKind::AttackDefend,
            Self::ThreePoint(_) => ModeKind::ThreePoint,
        }
    }

    pub fn used(&self, index: usize) -> bool {
        match self {
            Self::AttackDefend(mode) => mode.used(index),
            Self::ThreePoint(_) => index < MAX_POINTS,
        }
    }

    pub fn initial_owner(&self, index: usize) -> Team {
        match self {
            Self::AttackDefend(mode) => mode.initial_owner(index),
            Self::ThreePoint(mode) => mode.initial_owner(index),
        }
    }

    pub fn gates(&self, index: usize) -> CaptureGates {
        match self {
            Self::AttackDefend(mode) => mode.gates(index),
            Self::ThreePoint(mode) => mode.gates(index),
        }
    }

    pub fn attribute_unknown(&self, point_owner: Team, count: u32) -> (u32, u32) {
        match self {
            Self::AttackDefend(mode) => mode.attribute_unknown(point_owner, count),
            Self::ThreePoint(mode) => mode.attribute_unknown(point_owner, count),
        }
    }

    pub fn start(&mut self, now_ms: u64) {
        match self {
            Self::AttackDefend(mode) => mode.start(now_ms),
            Self::ThreePoint(mode) => mode.start(now_ms),
        }
    }

    pub fn cancel(&mut self) {
        match self {
            Self::AttackDefend(mode) => mode.cancel(),
            Self::ThreePoint(mode) => mode.cancel(),
        }
    }

    pub fn evaluate(
        &mut self,
        points: &[ControlPoint],
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        match self {
            Self::AttackDefend(mode) => mode.evaluate(points, now_ms, events),
            Self::ThreePoint(mode) => mode.evaluate(points, now_ms, events),
        }
    }

    pub fn timer(&self) -> &RoundTimer {
        match self {
            Self::AttackDefend(mode) => mode.timer(),
            Self::ThreePoint(mode) => mode.timer(),
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self {
            Self::AttackDefend(mode) => mode.remaining_ms(now_ms),
            Self::ThreePoint(mode) => mode.remaining_ms(now_ms),
        }
    }

    pub fn extension_ms(&self) -> u64 {
        match self {
            Self::AttackDefend(mode) => mode.extension_ms(),
            Self::ThreePoint(mode) => mode.extension_ms(),
        }
    }

    pub fn overtime(&self) -> bool {
        match self {
            Self::AttackDefend(mode) => mode.overtime(),
            Self::ThreePoint(mode) => mode.overtime(),
        }
    }
}

pub(crate) fn owners_of(points: &[ControlPoint]) -> [Team; MAX_POINTS] {
    debug_assert_eq!(points.len(), MAX_POINTS);
    let mut owners = [Team::Nobody; MAX_POINTS];
    for (slot, point) in owners.iter_mut().zip(points) {
        *slot = point.owner();
    }
    owners
}
