use crate::WrappedCompanion;
use std::fmt;

/// The component that actually halts and resumes mutator threads.
///
/// The companion thread hands every stop-the-world pause to
/// [`SafepointExecutor::execute`]. An implementation must:
///
/// 1. bring every mutator thread to a safepoint and keep it there,
/// 2. call [`StwOperation::evaluate`] exactly once, on its own thread, while
///    the mutators are halted,
/// 3. let the mutators run again only after `evaluate` returns, then return.
pub trait SafepointExecutor: Send + Sync + 'static {
    /// Run `op` with all mutators halted. Blocks until they run again.
    fn execute(&self, op: &StwOperation<'_>);

    /// True when called from the thread that evaluates operations.
    fn is_executor_thread(&self) -> bool;

    /// True when called from an application thread. Such threads may wait
    /// for a collection but never request one.
    fn is_mutator_thread(&self) -> bool {
        false
    }
}

/// A pending stop-the-world pause, handed to the executor.
pub struct StwOperation<'a> {
    companion: &'a WrappedCompanion,
}

impl<'a> StwOperation<'a> {
    pub(crate) fn new(companion: &'a WrappedCompanion) -> StwOperation<'a> {
        StwOperation { companion }
    }

    /// Tell the companion the world is stopped, then block until a
    /// resumption is requested.
    pub fn evaluate(&self) {
        self.companion.reach_suspended_and_wait_for_resume();
    }
}

impl fmt::Debug for StwOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StwOperation")
            .field("state", &self.companion.snapshot())
            .finish()
    }
}

impl<E: SafepointExecutor + ?Sized> SafepointExecutor for std::sync::Arc<E> {
    fn execute(&self, op: &StwOperation<'_>) {
        (**self).execute(op)
    }

    fn is_executor_thread(&self) -> bool {
        (**self).is_executor_thread()
    }

    fn is_mutator_thread(&self) -> bool {
        (**self).is_mutator_thread()
    }
}
