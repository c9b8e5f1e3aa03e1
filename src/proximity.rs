use crate::types::Team;

#[derive(Clone, Copy, Debug, Default)]
struct TeamTrace {
    last_seen_ms: Option<u64>,
    last_count: u32,
}

/// Debounces raw presence signals for one control point. A team counts as
/// close while its most recent sighting is younger than the decay window;
/// silence is never an explicit signal, it just ages out.
#[derive(Clone, Debug)]
pub struct Proximity {
    threshold_ms: u64,
    red: TeamTrace,
    blue: TeamTrace,
}

impl Proximity {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            red: TeamTrace::default(),
            blue: TeamTrace::default(),
        }
    }

    pub fn reset(&mut self, threshold_ms: u64) {
        self.threshold_ms = threshold_ms;
        self.red = TeamTrace::default();
        self.blue = TeamTrace::default();
    }

    pub fn observe_touch(&mut self, team: Team, touching: bool, now_ms: u64) {
        if touching {
            self.observe_count(team, 1, now_ms);
        }
    }

    pub fn observe_count(&mut self, team: Team, count: u32, now_ms: u64) {
        if count == 0 {
            return;
        }
        if let Some(trace) = self.trace_mut(team) {
            trace.last_seen_ms = Some(now_ms);
            trace.last_count = count;
        }
    }

    pub fn is_close(&self, team: Team, now_ms: u64) -> bool {
        match self.trace(team) {
            Some(trace) => match trace.last_seen_ms {
                Some(seen) => now_ms.saturating_sub(seen) < self.threshold_ms,
                None => false,
            },
            None => false,
        }
    }

    pub fn last_count(&self, team: Team, now_ms: u64) -> u32 {
        if !self.is_close(team, now_ms) {
            return 0;
        }
        self.trace(team).map(|t| t.last_count).unwrap_or(0)
    }

    fn trace(&self, team: Team) -> Option<&TeamTrace> {
        match team {
            Team::Red => Some(&self.red),
            Team::Blue => Some(&self.blue),
            _ => None,
        }
    }

    fn trace_mut(&mut self, team: Team) -> Option<&mut TeamTrace> {
        match team {
            Team::Red => Some(&mut self.red),
            Team::Blue => Some(&mut self.blue),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sighting_stays_close_within_window() {
        let mut prox = Proximity::new(2_000);
        prox.observe_count(Team::Red, 2, 1_000);
        assert!(prox.is_close(Team::Red, 1_000));
        assert!(prox.is_close(Team::Red, 2_999));
        assert!(!prox.is_close(Team::Red, 3_000));
    }

    #[test]
    fn zero_count_is_ignored() {
        let mut prox = Proximity::new(2_000);
        prox.observe_count(Team::Blue, 0, 1_000);
        assert!(!prox.is_close(Team::Blue, 1_000));
    }

    #[test]
    fn touch_false_records_nothing() {
        let mut prox = Proximity::new(2_000);
        prox.observe_touch(Team::Blue, false, 1_000);
        assert!(!prox.is_close(Team::Blue, 1_000));
        prox.observe_touch(Team::Blue, true, 1_500);
        assert!(prox.is_close(Team::Blue, 1_500));
    }

    #[test]
    fn teams_decay_independently() {
        let mut prox = Proximity::new(1_000);
        prox.observe_count(Team::Red, 1, 0);
        prox.observe_count(Team::Blue, 3, 800);
        assert!(!prox.is_close(Team::Red, 1_200));
        assert!(prox.is_close(Team::Blue, 1_200));
    }

    #[test]
    fn last_count_decays_to_zero() {
        let mut prox = Proximity::new(1_000);
        prox.observe_count(Team::Red, 4, 500);
        assert_eq!(prox.last_count(Team::Red, 900), 4);
        assert_eq!(prox.last_count(Team::Red, 2_000), 0);
    }

    #[test]
    fn sentinel_teams_are_never_close() {
        let mut prox = Proximity::new(1_000);
        prox.observe_count(Team::Both, 5, 0);
        prox.observe_count(Team::Nobody, 5, 0);
        assert!(!prox.is_close(Team::Both, 0));
        assert!(!prox.is_close(Team::Nobody, 0));
    }

    #[test]
    fn reset_clears_traces_and_updates_window() {
        let mut prox = Proximity::new(1_000);
        prox.observe_count(Team::Red, 1, 0);
        prox.reset(5_000);
        assert!(!prox.is_close(Team::Red, 0));
        prox.observe_count(Team::Red, 1, 0);
        assert!(prox.is_close(Team::Red, 4_999));
    }
}
