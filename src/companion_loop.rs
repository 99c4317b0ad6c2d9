use crate::safepoint::StwOperation;
use crate::{StwPhase, WrappedCompanion};
use tracing::{debug, error, info};

/// Takes the process down if the companion thread unwinds. Requesters would
/// otherwise block forever on a thread that no longer exists.
struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("companion thread panicked, aborting");
            std::process::abort();
        }
    }
}

impl WrappedCompanion {
    /// Body of the companion thread. Never returns.
    pub(crate) fn run_forever(&self) {
        let _abort = AbortOnUnwind;

        loop {
            self.run_cycle();
        }
    }

    /// One full round: wait for a suspend request, let the executor stop the
    /// world, then publish the resumption.
    pub(crate) fn run_cycle(&self) {
        debug!("[companion] waiting for suspend request");
        {
            let guard = self.state.lock();
            guard.check_mutators_running("while idle");
            let guard = self
                .state
                .wait_until(guard, |r| r.desired == StwPhase::Suspended);
            guard.check_mutators_running("when suspend was requested");
        }

        // The lock must be free here: the executor's callback takes it from
        // another thread.
        debug!("[companion] handing operation to safepoint executor");
        let op = StwOperation::new(self);
        self.executor.execute(&op);
        debug!("[companion] safepoint executor returned");

        let resumption_count = {
            let mut guard = self.state.lock();
            guard.check_may_report_resumption();
            guard.reached = StwPhase::Resumed;
            guard.resumption_count += 1;
            self.state.notify_all();
            guard.resumption_count
        };

        info!(resumption_count, "[companion] mutators resumed");
    }
}
