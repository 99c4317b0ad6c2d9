//! A toy runtime for driving the companion end to end: a pool of mutator
//! threads that poll a safepoint flag, and an executor that parks them and
//! evaluates each operation on a short-lived VM thread.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use stw_companion::{SafepointExecutor, StwOperation};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct ParkState {
    stop_requested: bool,
    parked: usize,
}

#[derive(Debug, Default)]
struct PoolShared {
    park: Mutex<ParkState>,
    park_changed: Condvar,
    poll: AtomicBool,
    shutdown: AtomicBool,
    progress: Vec<AtomicU64>,
    mutator_ids: Mutex<Vec<ThreadId>>,
}

#[derive(Debug)]
pub struct MutatorPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl MutatorPool {
    pub fn spawn(mutators: usize) -> MutatorPool {
        let shared = Arc::new(PoolShared {
            progress: (0..mutators).map(|_| AtomicU64::new(0)).collect(),
            ..Default::default()
        });

        let handles = (0..mutators)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || mutator_loop(&shared, i))
            })
            .collect::<Vec<_>>();

        // Make sure every mutator has registered before anyone asks
        while shared.mutator_ids.lock().unwrap().len() < mutators {
            thread::yield_now();
        }

        MutatorPool { shared, handles }
    }

    /// Per-mutator iteration counts
    pub fn progress(&self) -> Vec<u64> {
        self.shared
            .progress
            .iter()
            .map(|p| p.load(Ordering::SeqCst))
            .collect()
    }

    pub fn executor(&self) -> PoolExecutor {
        PoolExecutor {
            pool: self.shared.clone(),
            vm_thread: Mutex::new(None),
            halted: Arc::new(AtomicBool::new(false)),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Drop for MutatorPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn mutator_loop(shared: &PoolShared, index: usize) {
    shared
        .mutator_ids
        .lock()
        .unwrap()
        .push(thread::current().id());

    while !shared.shutdown.load(Ordering::SeqCst) {
        shared.progress[index].fetch_add(1, Ordering::SeqCst);

        if shared.poll.load(Ordering::SeqCst) {
            let mut park = shared.park.lock().unwrap();
            if park.stop_requested {
                park.parked += 1;
                shared.park_changed.notify_all();
                while park.stop_requested {
                    park = shared.park_changed.wait(park).unwrap();
                }
                park.parked -= 1;
            }
        }

        thread::yield_now();
    }
}

#[derive(Debug)]
pub struct PoolExecutor {
    pool: Arc<PoolShared>,
    vm_thread: Mutex<Option<ThreadId>>,
    halted: Arc<AtomicBool>,
    executions: Arc<AtomicUsize>,
}

impl PoolExecutor {
    pub fn halted_flag(&self) -> Arc<AtomicBool> {
        self.halted.clone()
    }

    pub fn executions(&self) -> Arc<AtomicUsize> {
        self.executions.clone()
    }
}

impl SafepointExecutor for PoolExecutor {
    fn execute(&self, op: &StwOperation<'_>) {
        let mutators = self.pool.progress.len();
        {
            let mut park = self.pool.park.lock().unwrap();
            park.stop_requested = true;
            self.pool.poll.store(true, Ordering::SeqCst);
            while park.parked < mutators {
                park = self.pool.park_changed.wait(park).unwrap();
            }
        }
        self.halted.store(true, Ordering::SeqCst);

        thread::scope(|scope| {
            scope.spawn(|| {
                *self.vm_thread.lock().unwrap() = Some(thread::current().id());
                op.evaluate();
                *self.vm_thread.lock().unwrap() = None;
            });
        });

        self.halted.store(false, Ordering::SeqCst);
        self.executions.fetch_add(1, Ordering::SeqCst);
        {
            let mut park = self.pool.park.lock().unwrap();
            park.stop_requested = false;
            self.pool.poll.store(false, Ordering::SeqCst);
            self.pool.park_changed.notify_all();
        }
    }

    fn is_executor_thread(&self) -> bool {
        *self.vm_thread.lock().unwrap() == Some(thread::current().id())
    }

    fn is_mutator_thread(&self) -> bool {
        self.pool
            .mutator_ids
            .lock()
            .unwrap()
            .contains(&thread::current().id())
    }
}
