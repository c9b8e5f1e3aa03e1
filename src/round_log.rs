use std::collections::VecDeque;

use chrono::{SecondsFormat, Utc};

use crate::constants::ROUND_LOG_CAPACITY;
use crate::types::{RoundLogResponse, RoundRecord, RoundSummary};

/// Bounded in-memory history of finished rounds, newest last. Ids keep
/// counting up after old entries are evicted.
pub struct RoundLog {
    capacity: usize,
    next_id: u64,
    rounds: VecDeque<RoundRecord>,
}

impl Default for RoundLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundLog {
    pub fn new() -> Self {
        Self::with_capacity(ROUND_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 0,
            rounds: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn record(&mut self, summary: RoundSummary) -> RoundRecord {
        let record = RoundRecord {
            id: self.next_id,
            ended_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            summary,
        };
        self.next_id += 1;
        self.rounds.push_back(record.clone());
        while self.rounds.len() > self.capacity {
            self.rounds.pop_front();
        }
        record
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> RoundLogResponse {
        RoundLogResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            rounds: self.recent(requested_limit),
        }
    }

    fn recent(&self, requested_limit: Option<usize>) -> Vec<RoundRecord> {
        let limit = requested_limit.unwrap_or(10).clamp(1, self.capacity);
        self.rounds.iter().rev().take(limit).cloned().collect()
    }
}
