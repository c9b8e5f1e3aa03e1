use crate::types::EventKind;

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const MAX_POINTS: usize = 3;

pub const DEFAULT_CAPTURE_MS: u64 = 30_000;
pub const DEFAULT_TIME_LIMIT_MS: u64 = 600_000;
pub const DEFAULT_START_DELAY_MS: u64 = 10_000;
pub const DEFAULT_BONUS_MS: u64 = 120_000;
pub const DEFAULT_PRESENCE_DECAY_MS: u64 = 2_000;

pub const MIN_CAPTURE_MS: u64 = 1_000;
pub const MIN_TIME_LIMIT_MS: u64 = 10_000;

pub const STARTING_MILESTONES_S: [u64; 8] = [60, 30, 10, 5, 4, 3, 2, 1];
pub const ENDING_MILESTONES_S: [u64; 9] = [300, 60, 30, 10, 5, 4, 3, 2, 1];

pub const ROUND_LOG_CAPACITY: usize = 50;

pub fn event_cooldown_ms(kind: EventKind) -> u64 {
    match kind {
        EventKind::CaptureStarted => 1_000,
        EventKind::Contested => 1_000,
        EventKind::Captured => 1_000,
        EventKind::TimeExtended => 1_000,
        EventKind::StartingIn => 900,
        EventKind::EndingIn => 900,
        EventKind::Overtime => 5_000,
        EventKind::GameStarted => 0,
        EventKind::Victory => 0,
        EventKind::Cancelled => 0,
    }
}
