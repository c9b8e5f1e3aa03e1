use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BONUS_MS, DEFAULT_CAPTURE_MS, DEFAULT_PRESENCE_DECAY_MS, DEFAULT_START_DELAY_MS,
    DEFAULT_TIME_LIMIT_MS, MAX_POINTS, MIN_CAPTURE_MS, MIN_TIME_LIMIT_MS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
    Nobody,
    Both,
}

impl Team {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            "nobody" => Some(Self::Nobody),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
            other => other,
        }
    }

    pub fn is_side(self) -> bool {
        matches!(self, Self::Red | Self::Blue)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    AttackDefend,
    ThreePoint,
}

impl ModeKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "attack_defend" => Some(Self::AttackDefend),
            "three_point" => Some(Self::ThreePoint),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Countdown,
    Running,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    RedVictory,
    BlueVictory,
    Stalemate,
}

impl RoundOutcome {
    pub fn winning_team(self) -> Team {
        match self {
            Self::RedVictory => Team::Red,
            Self::BlueVictory => Team::Blue,
            Self::Stalemate => Team::Nobody,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureGates {
    pub red: bool,
    pub blue: bool,
}

impl CaptureGates {
    pub fn none() -> Self {
        Self {
            red: false,
            blue: false,
        }
    }

    pub fn both() -> Self {
        Self {
            red: true,
            blue: true,
        }
    }

    pub fn only(team: Team) -> Self {
        Self {
            red: team == Team::Red,
            blue: team == Team::Blue,
        }
    }

    pub fn allows(&self, team: Team) -> bool {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("capture duration {0}ms is too short")]
    CaptureTooShort(u64),
    #[error("time limit {0}ms is too short")]
    TimeLimitTooShort(u64),
    #[error("presence decay window must be positive")]
    ZeroDecayWindow,
    #[error("at least one point must be used")]
    NoUsedPoints,
    #[error("used point {0} follows an unused slot")]
    NonContiguousUsedPoints(usize),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("a round is already active")]
    RoundActive,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct GameConfig {
    pub mode: ModeKind,
    #[serde(rename = "captureMs")]
    pub capture_ms: u64,
    #[serde(rename = "timeLimitMs")]
    pub time_limit_ms: u64,
    #[serde(rename = "startDelayMs")]
    pub start_delay_ms: u64,
    #[serde(rename = "bonusMs")]
    pub bonus_ms: u64,
    #[serde(rename = "presenceDecayMs")]
    pub presence_decay_ms: u64,
    pub used: [bool; MAX_POINTS],
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: ModeKind::AttackDefend,
            capture_ms: DEFAULT_CAPTURE_MS,
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            start_delay_ms: DEFAULT_START_DELAY_MS,
            bonus_ms: DEFAULT_BONUS_MS,
            presence_decay_ms: DEFAULT_PRESENCE_DECAY_MS,
            used: [true; MAX_POINTS],
        }
    }
}

impl GameConfig {
    pub fn normalized(&self) -> Self {
        let mut config = *self;
        if config.capture_ms > config.time_limit_ms {
            tracing::warn!(
                capture_ms = config.capture_ms,
                time_limit_ms = config.time_limit_ms,
                "capture duration exceeds time limit, clamping"
            );
            config.capture_ms = config.time_limit_ms;
        }
        if config.mode == ModeKind::ThreePoint {
            config.used = [true; MAX_POINTS];
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_ms < MIN_CAPTURE_MS {
            return Err(ConfigError::CaptureTooShort(self.capture_ms));
        }
        if self.time_limit_ms < MIN_TIME_LIMIT_MS {
            return Err(ConfigError::TimeLimitTooShort(self.time_limit_ms));
        }
        if self.presence_decay_ms == 0 {
            return Err(ConfigError::ZeroDecayWindow);
        }
        if self.mode == ModeKind::AttackDefend {
            if !self.used[0] {
                return Err(ConfigError::NoUsedPoints);
            }
            let mut gap = false;
            for (i, &used) in self.used.iter().enumerate() {
                if used && gap {
                    return Err(ConfigError::NonContiguousUsedPoints(i));
                }
                if !used {
                    gap = true;
                }
            }
        }
        Ok(())
    }

    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|&&u| u).count()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    CaptureStarted {
        point: usize,
        team: Team,
    },
    Contested {
        point: usize,
    },
    Captured {
        point: usize,
        team: Team,
    },
    GameStarted,
    StartingIn {
        seconds: u64,
    },
    EndingIn {
        seconds: u64,
    },
    TimeExtended {
        seconds: u64,
    },
    Overtime,
    Victory {
        team: Team,
    },
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    CaptureStarted,
    Contested,
    Captured,
    GameStarted,
    StartingIn,
    EndingIn,
    TimeExtended,
    Overtime,
    Victory,
    Cancelled,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CaptureStarted { .. } => EventKind::CaptureStarted,
            Self::Contested { .. } => EventKind::Contested,
            Self::Captured { .. } => EventKind::Captured,
            Self::GameStarted => EventKind::GameStarted,
            Self::StartingIn { .. } => EventKind::StartingIn,
            Self::EndingIn { .. } => EventKind::EndingIn,
            Self::TimeExtended { .. } => EventKind::TimeExtended,
            Self::Overtime => EventKind::Overtime,
            Self::Victory { .. } => EventKind::Victory,
            Self::Cancelled => EventKind::Cancelled,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PointView {
    pub index: usize,
    pub used: bool,
    pub owner: Team,
    pub on: Team,
    pub capturing: Team,
    pub contested: bool,
    #[serde(rename = "progressPercent")]
    pub progress_percent: f32,
    #[serde(rename = "redCount")]
    pub red_count: u32,
    #[serde(rename = "blueCount")]
    pub blue_count: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub mode: ModeKind,
    #[serde(rename = "elapsedSeconds")]
    pub elapsed_seconds: u64,
    #[serde(rename = "remainingSeconds")]
    pub remaining_seconds: u64,
    #[serde(rename = "extensionSeconds")]
    pub extension_seconds: u64,
    #[serde(rename = "countdownRemainingSeconds")]
    pub countdown_remaining_seconds: u64,
    pub overtime: bool,
    pub outcome: Option<RoundOutcome>,
    pub points: Vec<PointView>,
    #[serde(rename = "redHoldSeconds")]
    pub red_hold_seconds: u64,
    #[serde(rename = "blueHoldSeconds")]
    pub blue_hold_seconds: u64,
    pub events: Vec<GameEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub mode: ModeKind,
    pub outcome: RoundOutcome,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "extensionMs")]
    pub extension_ms: u64,
    #[serde(rename = "redHoldMs")]
    pub red_hold_ms: u64,
    #[serde(rename = "blueHoldMs")]
    pub blue_hold_ms: u64,
    #[serde(rename = "usedPoints")]
    pub used_points: usize,
    #[serde(rename = "finalOwners")]
    pub final_owners: Vec<Team>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: u64,
    #[serde(rename = "endedAt")]
    pub ended_at_iso: String,
    pub summary: RoundSummary,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundLogResponse {
    #[serde(rename = "generatedAt")]
    pub generated_at_iso: String,
    pub rounds: Vec<RoundRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_gapped_used_points() {
        let config = GameConfig {
            used: [true, false, true],
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonContiguousUsedPoints(2))
        );
    }

    #[test]
    fn validate_requires_first_point() {
        let config = GameConfig {
            used: [false, false, false],
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoUsedPoints));
    }

    #[test]
    fn validate_rejects_short_durations() {
        let config = GameConfig {
            capture_ms: 100,
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::CaptureTooShort(100)));

        let config = GameConfig {
            time_limit_ms: 1_000,
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TimeLimitTooShort(1_000)));
    }

    #[test]
    fn normalized_clamps_capture_to_time_limit() {
        let config = GameConfig {
            capture_ms: 120_000,
            time_limit_ms: 60_000,
            ..GameConfig::default()
        };
        assert_eq!(config.normalized().capture_ms, 60_000);
    }

    #[test]
    fn normalized_forces_all_points_for_three_point() {
        let config = GameConfig {
            mode: ModeKind::ThreePoint,
            used: [true, false, false],
            ..GameConfig::default()
        };
        assert_eq!(config.normalized().used, [true, true, true]);
    }

    #[test]
    fn gates_ignore_non_side_teams() {
        let gates = CaptureGates::both();
        assert!(gates.allows(Team::Red));
        assert!(gates.allows(Team::Blue));
        assert!(!gates.allows(Team::Nobody));
        assert!(!gates.allows(Team::Both));
    }
}
