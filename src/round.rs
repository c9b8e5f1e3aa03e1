use crate::types::{RoundOutcome, Team};

/// Shared round bookkeeping embedded by every mode: start/cancel lifecycle,
/// per-team hold accumulation and a write-once outcome.
#[derive(Clone, Debug, Default)]
pub struct RoundTimer {
    start_ms: Option<u64>,
    last_accrue_ms: Option<u64>,
    outcome: Option<RoundOutcome>,
    red_hold_ms: u64,
    blue_hold_ms: u64,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn start(&mut self, now_ms: u64) {
        self.start_ms = Some(now_ms);
        self.last_accrue_ms = Some(now_ms);
    }

    pub fn cancel(&mut self) {
        self.start_ms = None;
        self.last_accrue_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.start_ms.is_some()
    }

    pub fn is_over(&self) -> bool {
        !self.is_running() || self.outcome.is_some()
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.start_ms {
            Some(start) => now_ms.saturating_sub(start),
            None => 0,
        }
    }

    pub fn elapsed_seconds(&self, now_ms: u64) -> u64 {
        self.elapsed_ms(now_ms) / 1000
    }

    pub fn declare(&mut self, outcome: RoundOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn accrue_tick(&mut self, owners: &[Team], now_ms: u64) {
        let last = match self.last_accrue_ms {
            Some(last) => last,
            None => return,
        };
        let dt_ms = now_ms.saturating_sub(last);
        for owner in owners {
            match owner {
                Team::Red => self.red_hold_ms += dt_ms,
                Team::Blue => self.blue_hold_ms += dt_ms,
                _ => {}
            }
        }
        self.last_accrue_ms = Some(now_ms);
    }

    pub fn red_hold_ms(&self) -> u64 {
        self.red_hold_ms
    }

    pub fn blue_hold_ms(&self) -> u64 {
        self.blue_hold_ms
    }
}
