use std::fmt;

/// Progress of a single `apply_and_persist` call.
///
/// ```text
/// Idle -> Loading -> Computing -> Persisting -> Done
///            |           |            |
///            +-----------+------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    Computing,
    Persisting,
    Done,
    Failed,
}

impl SyncPhase {
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Computing)
                | (Loading, Failed)
                | (Computing, Persisting)
                | (Computing, Failed)
                | (Persisting, Done)
                | (Persisting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Loading => "loading",
            SyncPhase::Computing => "computing",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Phase tracker for one call; logs each step under the user's id.
#[derive(Debug)]
pub(crate) struct PhaseTracker<'a> {
    phase: SyncPhase,
    user: &'a str,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(user: &'a str) -> Self {
        Self {
            phase: SyncPhase::Idle,
            user,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal sync transition {} -> {}",
            self.phase,
            next
        );
        log::debug!("sync {}: {} -> {}", self.user, self.phase, next);
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            SyncPhase::Idle,
            SyncPhase::Loading,
            SyncPhase::Computing,
            SyncPhase::Persisting,
            SyncPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_phases_do_not_move() {
        for next in [SyncPhase::Idle, SyncPhase::Loading, SyncPhase::Done] {
            assert!(!SyncPhase::Done.can_transition_to(next));
            assert!(!SyncPhase::Failed.can_transition_to(next));
        }
        assert!(SyncPhase::Failed.is_terminal());
        assert!(!SyncPhase::Persisting.is_terminal());
    }

    #[test]
    fn idle_cannot_fail_or_skip() {
        assert!(!SyncPhase::Idle.can_transition_to(SyncPhase::Failed));
        assert!(!SyncPhase::Idle.can_transition_to(SyncPhase::Persisting));
    }

    #[test]
    fn tracker_follows_transitions() {
        let mut tracker = PhaseTracker::new("u1");
        tracker.advance(SyncPhase::Loading);
        tracker.advance(SyncPhase::Failed);
        assert_eq!(tracker.phase(), SyncPhase::Failed);
    }
}
