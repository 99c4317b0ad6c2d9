use crate::StwPhase;
use std::fmt;
use std::io;
use thiserror::Error;
use tracing::error;

/// Threads that may never issue phase requests.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThreadRole {
    /// The companion thread itself
    Companion,
    /// The thread that halts and resumes mutators
    SafepointExecutor,
    /// An application thread
    Mutator,
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRole::Companion => f.write_str("companion thread"),
            ThreadRole::SafepointExecutor => {
                f.write_str("safepoint executor thread")
            }
            ThreadRole::Mutator => f.write_str("mutator thread"),
        }
    }
}

/// A broken contract of the stop-the-world protocol. These are programming
/// errors in how the protocol is used and are never recovered from: see
/// [`fatal`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum ProtocolInvariantViolation {
    /// A request came from a thread that takes part in the pause itself
    #[error("requests can only be made by collector threads, found {0}")]
    ForbiddenRequester(ThreadRole),

    /// The phase is already the outstanding request
    #[error("state {0} already requested")]
    DuplicateRequest(StwPhase),

    /// Waiting for a phase that nobody has asked for
    #[error("state {awaited} not requested, outstanding request is {desired}")]
    PhaseNotRequested {
        /// Phase the caller wanted to wait for
        awaited: StwPhase,
        /// Phase actually requested
        desired: StwPhase,
    },

    /// The suspension callback ran somewhere other than the executor thread
    #[error(
        "reach_suspended_and_wait_for_resume can only be executed by the \
         safepoint executor thread"
    )]
    CallbackOffExecutorThread,

    /// Desired and reached phases disagree with the protocol at a checkpoint
    #[error("inconsistent state {checkpoint}: desired {desired}, reached {reached}")]
    InconsistentState {
        /// Where in the protocol the check failed
        checkpoint: &'static str,
        /// Desired phase at the time of the check
        desired: StwPhase,
        /// Reached phase at the time of the check
        reached: StwPhase,
    },

    /// A thread panicked while holding the state lock
    #[error("companion state poisoned by a panic while it was locked")]
    Poisoned,
}

/// Errors from starting the companion thread.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// `start` was already called on this companion
    #[error("companion thread already started")]
    AlreadyStarted,

    /// The OS refused to create the thread
    #[error("failed to spawn companion thread `{name}`")]
    Spawn {
        /// Name the thread would have had
        name: String,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },
}

/// Report a protocol violation and abort the process. The offending thread
/// may hold the state lock with mutators halted, so unwinding it would leave
/// the world stopped for good.
#[cold]
#[track_caller]
pub(crate) fn fatal(violation: ProtocolInvariantViolation) -> ! {
    error!(%violation, "stop-the-world protocol violated");

    #[cfg(test)]
    panic!("protocol invariant violation: {}", violation);

    #[cfg(not(test))]
    {
        eprintln!("protocol invariant violation: {}", violation);
        std::process::abort()
    }
}
