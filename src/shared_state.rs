use crate::sync::{Condvar, Mutex, MutexGuard};
use crate::violation::{fatal, ProtocolInvariantViolation};
use crate::StwPhase;
use tracing::trace;

/// A consistent copy of the protocol state, taken under the lock.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PhaseSnapshot {
    /// Phase most recently requested
    pub desired: StwPhase,
    /// Phase the companion has actually reached
    pub reached: StwPhase,
    /// Number of completed suspend/resume cycles
    pub resumption_count: u64,
}

/// The guarded fields. Only reachable through a [`MutexGuard`] from
/// [`SharedState::lock`].
#[derive(Debug)]
pub(crate) struct PhaseRecord {
    pub(crate) desired: StwPhase,
    pub(crate) reached: StwPhase,
    pub(crate) resumption_count: u64,
}

impl PhaseRecord {
    pub(crate) fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            desired: self.desired,
            reached: self.reached,
            resumption_count: self.resumption_count,
        }
    }

    fn inconsistent(&self, checkpoint: &'static str) -> ! {
        fatal(ProtocolInvariantViolation::InconsistentState {
            checkpoint,
            desired: self.desired,
            reached: self.reached,
        })
    }

    /// Mutators must be running whenever the companion is idle.
    pub(crate) fn check_mutators_running(&self, checkpoint: &'static str) {
        if self.reached != StwPhase::Resumed {
            self.inconsistent(checkpoint)
        }
    }

    /// Resumed -> Suspended is only legal while a suspension is requested.
    pub(crate) fn check_may_reach_suspended(&self) {
        if self.desired != StwPhase::Suspended
            || self.reached != StwPhase::Resumed
        {
            self.inconsistent("when reaching suspended")
        }
    }

    /// Suspended -> Resumed is only legal while a resumption is requested.
    pub(crate) fn check_may_report_resumption(&self) {
        if self.desired != StwPhase::Resumed
            || self.reached != StwPhase::Suspended
        {
            self.inconsistent("when reporting resumption")
        }
    }

    pub(crate) fn check_not_requested(&self, phase: StwPhase) {
        if self.desired == phase {
            fatal(ProtocolInvariantViolation::DuplicateRequest(phase))
        }
    }

    pub(crate) fn check_requested(&self, phase: StwPhase) {
        if self.desired != phase {
            fatal(ProtocolInvariantViolation::PhaseNotRequested {
                awaited: phase,
                desired: self.desired,
            })
        }
    }
}

/// Protocol state plus the one mutex/condvar pair every party waits on.
#[derive(Debug)]
pub(crate) struct SharedState {
    record: Mutex<PhaseRecord>,
    changed: Condvar,
}

impl SharedState {
    pub(crate) fn new() -> SharedState {
        SharedState {
            record: Mutex::new(PhaseRecord {
                desired: StwPhase::Resumed,
                reached: StwPhase::Resumed,
                resumption_count: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PhaseRecord> {
        self.record
            .lock()
            .unwrap_or_else(|_| fatal(ProtocolInvariantViolation::Poisoned))
    }

    /// Block until `done` holds. The predicate is re-checked under the lock
    /// before the first wait and after every wake, spurious or not.
    pub(crate) fn wait_until<'a, F>(
        &self,
        mut guard: MutexGuard<'a, PhaseRecord>,
        mut done: F,
    ) -> MutexGuard<'a, PhaseRecord>
    where
        F: FnMut(&PhaseRecord) -> bool,
    {
        while !done(&guard) {
            guard = self
                .changed
                .wait(guard)
                .unwrap_or_else(|_| fatal(ProtocolInvariantViolation::Poisoned));
            trace!(
                desired = %guard.desired,
                reached = %guard.reached,
                resumption_count = guard.resumption_count,
                "woke up"
            );
        }

        guard
    }

    pub(crate) fn notify_all(&self) {
        self.changed.notify_all();
    }
}
