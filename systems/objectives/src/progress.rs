//! Progress counters shared by the objective kinds.

use serde::{Deserialize, Serialize};

/// Progress of objectives that travel to a host-selected target.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TargetProgress {
    /// No target yet.
    #[default]
    NotStarted,
    /// A position request is in flight.
    WaitingForHostAnswer,
    /// The target is known and tracked by a marker.
    Active,
    /// The player reached the target.
    Reached,
}

impl TargetProgress {
    /// Numeric value persisted and displayed for the progress.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::WaitingForHostAnswer => 1,
            Self::Active => 2,
            Self::Reached => 3,
        }
    }

    /// Reports whether a running objective may move from `self` to `next`.
    ///
    /// `Reached -> Active` is only allowed for revocable objectives. The
    /// `WaitingForHostAnswer -> NotStarted` rewind is reserved for restores
    /// and is performed through [`TargetProgress::rewound`].
    #[must_use]
    pub const fn can_advance_to(self, next: Self, revocable: bool) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::WaitingForHostAnswer)
                | (Self::NotStarted, Self::Active)
                | (Self::WaitingForHostAnswer, Self::Active)
                | (Self::Active, Self::Reached)
        ) || (revocable && matches!((self, next), (Self::Reached, Self::Active)))
    }

    /// Progress after loading from persistence: pending requests are re-sent.
    #[must_use]
    pub const fn rewound(self) -> Self {
        match self {
            Self::WaitingForHostAnswer => Self::NotStarted,
            other => other,
        }
    }
}

/// Completion latch of an objective.
///
/// Setting completion is one-way for most objectives. Revocation is left to
/// the objective kinds that are allowed to lose completion again. Failure is
/// permanent and hides completion for good.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    complete: bool,
    failed: bool,
}

impl Completion {
    /// Latches completion. Returns `true` when the latch changed.
    pub fn set_complete(&mut self) -> bool {
        if self.failed || self.complete {
            return false;
        }
        self.complete = true;
        true
    }

    /// Clears completion. Returns `true` when the latch changed.
    pub fn revoke(&mut self) -> bool {
        if self.failed || !self.complete {
            return false;
        }
        self.complete = false;
        true
    }

    /// Marks the objective failed for good.
    pub fn fail(&mut self) {
        self.failed = true;
        self.complete = false;
    }

    /// Reports whether the objective currently counts as complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete && !self.failed
    }

    /// Reports whether the objective failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_only() {
        use TargetProgress::*;
        assert!(NotStarted.can_advance_to(WaitingForHostAnswer, false));
        assert!(NotStarted.can_advance_to(Active, false));
        assert!(WaitingForHostAnswer.can_advance_to(Active, false));
        assert!(Active.can_advance_to(Reached, false));

        assert!(!NotStarted.can_advance_to(Reached, true));
        assert!(!WaitingForHostAnswer.can_advance_to(NotStarted, true));
        assert!(!Reached.can_advance_to(Active, false));
        assert!(Reached.can_advance_to(Active, true));
    }

    #[test]
    fn rewind_only_touches_pending_requests() {
        assert_eq!(
            TargetProgress::WaitingForHostAnswer.rewound(),
            TargetProgress::NotStarted
        );
        assert_eq!(TargetProgress::Active.rewound(), TargetProgress::Active);
        assert_eq!(TargetProgress::Reached.value(), 3);
    }

    #[test]
    fn failure_overrides_completion_forever() {
        let mut completion = Completion::default();
        assert!(completion.set_complete());
        assert!(!completion.set_complete());
        assert!(completion.is_complete());

        completion.fail();
        assert!(!completion.is_complete());
        assert!(!completion.set_complete());
        assert!(!completion.revoke());
        assert!(completion.is_failed());
    }

    #[test]
    fn revoke_reopens_a_live_latch() {
        let mut completion = Completion::default();
        assert!(!completion.revoke());
        let _ = completion.set_complete();
        assert!(completion.revoke());
        assert!(!completion.is_complete());
    }
}
