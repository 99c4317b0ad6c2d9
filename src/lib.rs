//! # STW Companion
//!
//! This crate provides the rendezvous a garbage collector uses to stop the
//! world. Three parties take part:
//!
//! - collector threads, which ask for a pause with [`StwCompanion::request`]
//!   and later ask for the mutators to run again,
//! - the companion thread, started with [`StwCompanion::start`], which waits
//!   for a pause request and hands it to the safepoint executor,
//! - the [`SafepointExecutor`], which halts every mutator and, while they are
//!   halted, evaluates the [`StwOperation`] it was given. Evaluation reports
//!   the world stopped and blocks until a resumption is requested.
//!
//! ## Features
//! - Every wait re-checks its predicate under the lock after each wake, so
//! spurious wakeups and notifications meant for other waiters are harmless.
//! - Generation counting: [`StwCompanion::wait_for_next_resumption`] waits
//! for a specific future value of a monotonic counter, so it can't miss the
//! next cycle or return for one that finished before the call.
//! - Misuse is fatal. Overlapping requests, requests from the wrong thread and
//! corrupted state are logged as a [`ProtocolInvariantViolation`] and abort
//! the process, as does a panic escaping the companion thread.
//!
//! ## Example
//!
//! ```rust
//! # use std::sync::Mutex;
//! # use std::thread::{self, ThreadId};
//! # use stw_companion::{
//! #     CompanionConfig, SafepointExecutor, StwCompanion, StwOperation,
//! #     StwPhase,
//! # };
//! // An executor with no mutators to halt, evaluating operations on the
//! // companion thread itself
//! #[derive(Default)]
//! struct Inline {
//!     executing_on: Mutex<Option<ThreadId>>,
//! }
//!
//! impl SafepointExecutor for Inline {
//!     fn execute(&self, op: &StwOperation<'_>) {
//!         *self.executing_on.lock().unwrap() = Some(thread::current().id());
//!         op.evaluate();
//!         *self.executing_on.lock().unwrap() = None;
//!     }
//!
//!     fn is_executor_thread(&self) -> bool {
//!         *self.executing_on.lock().unwrap() == Some(thread::current().id())
//!     }
//! }
//!
//! let companion = StwCompanion::new(Inline::default());
//! companion.start(&CompanionConfig::default()).unwrap();
//!
//! // Stop the world and wait until it is stopped
//! companion.request(StwPhase::Suspended, true);
//! assert_eq!(companion.snapshot().reached, StwPhase::Suspended);
//!
//! // ... collect ...
//!
//! companion.request(StwPhase::Resumed, true);
//! assert_eq!(companion.snapshot().resumption_count, 1);
//! ```
//!
//! ## Caveats
//! - There are no timeouts. Every wait blocks until its condition holds.
//! - The companion thread runs until the process exits and can't be shut
//! down. It holds its own reference to the shared state, so dropping every
//! [`StwCompanion`] handle does not tear the state down; there is no way to
//! reclaim it before process exit.
#![cfg_attr(
    feature = "document-features",
    doc = "## Cargo features",
    doc = document_features::document_features!()
)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links,
    clippy::all
)]

mod companion_loop;
mod config;
mod named_thread;
mod safepoint;
mod shared_state;
mod stw_phase;
mod sync;
mod violation;


pub use config::{CompanionConfig, DEFAULT_THREAD_NAME};
pub use safepoint::{SafepointExecutor, StwOperation};
pub use shared_state::PhaseSnapshot;
pub use stw_phase::StwPhase;
pub use violation::{CompanionError, ProtocolInvariantViolation, ThreadRole};

use named_thread::spawn_named;
use shared_state::SharedState;
use std::fmt;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};
use sync::{Arc, AtomicBool, Ordering};
use tracing::{debug, info};
use violation::fatal;

/// Handle to a stop-the-world companion. Clones share the same state and
/// the same companion thread.
#[derive(Clone)]
pub struct StwCompanion(Arc<WrappedCompanion>);

pub(crate) struct WrappedCompanion {
    state: SharedState,
    executor: Box<dyn SafepointExecutor>,
    started: AtomicBool,
    companion_thread: OnceLock<ThreadId>,
}

impl WrappedCompanion {
    fn snapshot(&self) -> PhaseSnapshot {
        self.state.lock().snapshot()
    }

    fn is_companion_thread(&self) -> bool {
        self.companion_thread.get() == Some(&thread::current().id())
    }

    fn check_requester_thread(&self) {
        let role = if self.is_companion_thread() {
            Some(ThreadRole::Companion)
        } else if self.executor.is_executor_thread() {
            Some(ThreadRole::SafepointExecutor)
        } else if self.executor.is_mutator_thread() {
            Some(ThreadRole::Mutator)
        } else {
            None
        };

        if let Some(role) = role {
            fatal(ProtocolInvariantViolation::ForbiddenRequester(role))
        }
    }

    /// Record `desired` as the outstanding request, without checking who is
    /// asking.
    fn record_request(&self, desired: StwPhase, wait_until_reached: bool) {
        let mut guard = self.state.lock();
        guard.check_not_requested(desired);
        guard.desired = desired;
        debug!(%desired, "desired state updated");
        self.state.notify_all();

        if wait_until_reached {
            let _guard = self.state.wait_until(guard, |r| r.reached == desired);
        }
    }

    fn wait_for_reached(&self, desired: StwPhase) {
        let guard = self.state.lock();
        guard.check_requested(desired);
        let _guard = self.state.wait_until(guard, |r| r.reached == desired);
    }

    fn wait_for_next_resumption(&self) {
        let guard = self.state.lock();
        let target = guard.resumption_count + 1;
        let _guard = self
            .state
            .wait_until(guard, |r| r.resumption_count >= target);
    }

    pub(crate) fn reach_suspended_and_wait_for_resume(&self) {
        if !self.executor.is_executor_thread() {
            fatal(ProtocolInvariantViolation::CallbackOffExecutorThread)
        }

        let mut guard = self.state.lock();
        guard.check_may_reach_suspended();

        debug!("[stw-op] telling waiters the world stopped");
        guard.reached = StwPhase::Suspended;
        self.state.notify_all();

        debug!("[stw-op] waiting for resumption signal");
        let _guard = self
            .state
            .wait_until(guard, |r| r.desired == StwPhase::Resumed);
        debug!("[stw-op] resumption requested");
    }
}

impl StwCompanion {
    /// Create a companion in the resumed state, delegating pauses to
    /// `executor`. Nothing runs until [`StwCompanion::start`] is called.
    pub fn new<E: SafepointExecutor>(executor: E) -> StwCompanion {
        StwCompanion(Arc::new(WrappedCompanion {
            state: SharedState::new(),
            executor: Box::new(executor),
            started: AtomicBool::new(false),
            companion_thread: OnceLock::new(),
        }))
    }

    /// Spawn the companion thread. It runs for the rest of the process and is
    /// detached; it can't be stopped.
    pub fn start(&self, config: &CompanionConfig) -> Result<(), CompanionError> {
        if self
            .0
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CompanionError::AlreadyStarted);
        }

        let inner = self.0.clone();
        let spawned = spawn_named(config, move || {
            let _ = inner.companion_thread.set(thread::current().id());
            info!(
                thread = ?thread::current().id(),
                "[companion] companion thread started"
            );
            inner.run_forever();
        });

        match spawned {
            Ok(_detached) => Ok(()),
            Err(e) => {
                self.0.started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Whether [`StwCompanion::start`] has spawned the companion thread
    pub fn is_started(&self) -> bool {
        self.0.started.load(Ordering::SeqCst)
    }

    /// Ask for the world to reach `desired`. With `wait_until_reached`, block
    /// until the companion has reached it; otherwise return as soon as the
    /// request is recorded and use [`StwCompanion::wait_for_reached`] later.
    ///
    /// Only collector threads may call this. Calling it from the companion
    /// thread, the executor thread or a mutator, or requesting the phase that
    /// is already requested, is a fatal protocol violation.
    pub fn request(&self, desired: StwPhase, wait_until_reached: bool) {
        self.0.check_requester_thread();
        debug!(%desired, wait_until_reached, "entered request");
        self.0.record_request(desired, wait_until_reached);
    }

    /// Block until `desired` is reached. `desired` must be the outstanding
    /// request.
    pub fn wait_for_reached(&self, desired: StwPhase) {
        self.0.wait_for_reached(desired);
    }

    /// Block until the next suspend/resume cycle completes. A cycle that
    /// completed before this call never counts.
    pub fn wait_for_next_resumption(&self) {
        self.0.wait_for_next_resumption();
    }

    /// Report the world stopped, then block until resumption is requested.
    /// Only the safepoint executor may call this, with mutators halted;
    /// [`StwOperation::evaluate`] is the usual way in.
    pub fn reach_suspended_and_wait_for_resume(&self) {
        self.0.reach_suspended_and_wait_for_resume();
    }

    /// Current desired phase, reached phase and cycle count
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.0.snapshot()
    }

    /// Stop all mutators and wait until they are stopped
    pub fn stop_all_mutators(&self) {
        self.request(StwPhase::Suspended, true);
    }

    /// Let mutators run again and wait until the companion has seen them
    /// resume
    pub fn resume_mutators(&self) {
        self.request(StwPhase::Resumed, true);
    }

    /// Park the calling thread, typically a mutator that failed to allocate,
    /// until the next collection cycle has finished
    pub fn block_for_gc(&self) {
        self.wait_for_next_resumption();
    }
}

impl fmt::Debug for StwCompanion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StwCompanion")
            .field("started", &self.is_started())
            .field("state", &self.snapshot())
            .finish()
    }
}
