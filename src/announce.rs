use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::constants::event_cooldown_ms;
use crate::types::{EventKind, GameEvent};

pub trait EventSink: Send {
    fn notify(&mut self, event: &GameEvent);
}

pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&mut self, _event: &GameEvent) {}
}

/// Sink that buffers events for a driver loop to drain and fan out.
#[derive(Clone, Default)]
pub struct CollectorSink {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<GameEvent> {
        let mut guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }
}

impl EventSink for CollectorSink {
    fn notify(&mut self, event: &GameEvent) {
        let mut guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(event.clone());
    }
}

/// Gates outbound announcements with a per-event-type cooldown so a noisy
/// tick loop cannot spam the playback side.
pub struct Announcer {
    sink: Box<dyn EventSink>,
    last_emit: HashMap<EventKind, u64>,
}

impl Announcer {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink,
            last_emit: HashMap::new(),
        }
    }

    pub fn announce(&mut self, event: &GameEvent, now_ms: u64) -> bool {
        let kind = event.kind();
        let cooldown_ms = event_cooldown_ms(kind);
        if cooldown_ms > 0 {
            if let Some(&last) = self.last_emit.get(&kind) {
                if now_ms.saturating_sub(last) < cooldown_ms {
                    return false;
                }
            }
        }
        self.last_emit.insert(kind, now_ms);
        self.sink.notify(event);
        true
    }

    pub fn reset(&mut self) {
        self.last_emit.clear();
    }
}
