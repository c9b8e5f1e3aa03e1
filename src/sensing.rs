use std::sync::{PoisonError, RwLock};

use crate::constants::MAX_POINTS;
use crate::types::Team;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointCounts {
    pub red: u32,
    pub blue: u32,
    pub unknown: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresenceFrame {
    pub points: [PointCounts; MAX_POINTS],
}

/// Per-tick presence input. `sample` hands over at most one frame per report;
/// a quiet transport yields `None` and the proximity decay covers the gap.
pub trait PresenceSource: Send + Sync {
    fn sample(&self) -> Option<PresenceFrame>;
}

/// Latest-wins frame slot fed by the sensor transport and consumed by the
/// tick loop.
#[derive(Default)]
pub struct SharedPresenceSource {
    frame: RwLock<Option<PresenceFrame>>,
}

impl SharedPresenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: PresenceFrame) {
        let mut slot = self.frame.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(frame);
    }

    pub fn clear(&self) {
        let mut slot = self.frame.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

impl PresenceSource for SharedPresenceSource {
    fn sample(&self) -> Option<PresenceFrame> {
        let mut slot = self.frame.write().unwrap_or_else(PoisonError::into_inner);
        slot.take()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointOverride {
    pub red: bool,
    pub blue: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    pub enabled: bool,
    pub points: [PointOverride; MAX_POINTS],
}

impl ManualOverrides {
    pub fn active(&self, index: usize, team: Team) -> bool {
        if !self.enabled {
            return false;
        }
        match self.points.get(index) {
            Some(point) => match team {
                Team::Red => point.red,
                Team::Blue => point.blue,
                _ => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_consumes_the_pending_frame() {
        let source = SharedPresenceSource::new();
        let mut frame = PresenceFrame::default();
        frame.points[1].blue = 2;

        source.publish(frame);
        assert_eq!(source.sample(), Some(frame));
        assert_eq!(source.sample(), None);
    }

    #[test]
    fn publish_overwrites_unconsumed_frame() {
        let source = SharedPresenceSource::new();
        let mut first = PresenceFrame::default();
        first.points[0].red = 1;
        let mut second = PresenceFrame::default();
        second.points[0].red = 9;

        source.publish(first);
        source.publish(second);
        assert_eq!(source.sample(), Some(second));
    }

    #[test]
    fn clear_drops_pending_frame() {
        let source = SharedPresenceSource::new();
        source.publish(PresenceFrame::default());
        source.clear();
        assert_eq!(source.sample(), None);
    }

    #[test]
    fn overrides_need_the_global_flag() {
        let mut overrides = ManualOverrides::default();
        overrides.points[0].red = true;
        assert!(!overrides.active(0, Team::Red));

        overrides.enabled = true;
        assert!(overrides.active(0, Team::Red));
        assert!(!overrides.active(0, Team::Blue));
        assert!(!overrides.active(5, Team::Red));
        assert!(!overrides.active(0, Team::Both));
    }
}
