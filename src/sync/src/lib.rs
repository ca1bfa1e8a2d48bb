//! procsync
//!
//! Mutexes, condition variables and counting semaphores that work across
//! process boundaries, not just between threads.
//!
//! # Architecture
//!
//! The crate is structured into the following modules:
//! - `shm`: anonymous shared mappings that hold the control blocks
//! - `sync`: the primitives and their destroy protocols
//! - `time`: relative timeout to absolute deadline conversion
//! - `sys`: libc return-code handling, process-shared initialization, clocks
//!
//! Mutex and condition variable control blocks live in `MAP_SHARED`
//! anonymous memory, so they are shared with every process forked after
//! creation. Semaphores are named POSIX semaphores whose name is unlinked
//! immediately; they are likewise shared through `fork`.
//!
//! # Safety
//!
//! All unsafe code is documented with the invariant it relies on. The one
//! invariant callers must uphold themselves is that no handle is used after
//! another handle onto the same primitive has destroyed it; this is the
//! reason [`sync::Mutex::share`] and [`sync::Condvar::share`] are `unsafe`.

#![warn(missing_docs)]

pub mod shm;
pub mod sync;
pub mod sys;
pub mod time;

pub use procsync_common::{
    CallStatus, ClockSource, CondvarConfig, ErrorKind, Permissions, Result, SemaphoreConfig,
    SyncError,
};
pub use procsync_hal::{RealtimeClock, Timespec};
pub use sync::{Condvar, HandleState, Lockable, Mutex, Semaphore};
