//! Synchronization primitives used by the protocol. Under `--cfg loom` these
//! are swapped for loom's model-checked versions.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, Ordering};
#[cfg(loom)]
pub(crate) use loom::sync::{Arc, Condvar, Mutex, MutexGuard};

#[cfg(all(not(loom), feature = "portable_atomic"))]
pub(crate) use portable_atomic::{AtomicBool, Ordering};
#[cfg(all(not(loom), not(feature = "portable_atomic")))]
pub(crate) use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(not(loom))]
pub(crate) use std::sync::{Arc, Condvar, Mutex, MutexGuard};
