use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Millisecond time source injected into the engine. `now_ms` values are only
/// meaningful relative to each other within one process.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn seconds_since(&self, earlier_ms: u64) -> u64 {
        self.now_ms().saturating_sub(earlier_ms) / 1000
    }
}

/// Monotonic wall clock measured from process start.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for tests and the simulator.
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
