//! Process-shared synchronization primitives.
//!
//! Every primitive here lives in memory that outlives the process that
//! created it, so the usual Rust ownership story does not apply to the
//! underlying kernel object: destruction is an explicit, fallible call, and
//! dropping a handle only releases what that handle itself holds.
//!
//! # Primitives
//!
//! - [`Mutex`]: exclusive lock in a shared mapping
//! - [`Condvar`]: wait/notify primitive with its own embedded [`Mutex`]
//! - [`Semaphore`]: counting semaphore behind an immediately unlinked name
//!
//! # Per-handle lock state
//!
//! [`Mutex`] and [`Condvar`] handles remember whether *they* hold the lock.
//! Locking a handle that already holds it succeeds without a second OS call,
//! and unlocking a handle that does not hold it is a no-op. This is plain
//! bookkeeping, not recursive locking: two handles onto the same mutex
//! (in one process or across a `fork`) each keep their own flag.
//!
//! # Example
//!
//! ```no_run
//! use procsync::sync::{Condvar, Semaphore};
//!
//! let mut cond = Condvar::create()?;
//! let sem = Semaphore::create(0)?;
//!
//! cond.lock()?;
//! match cond.timedwait(0.25) {
//!     Err(e) if e.is_retryable() => {}
//!     other => other?,
//! }
//! cond.unlock()?;
//!
//! sem.post()?;
//! sem.wait()?;
//! cond.destroy()?;
//! # Ok::<(), procsync::SyncError>(())
//! ```

mod cond;
mod mutex;
mod name;
mod semaphore;

pub use cond::Condvar;
pub use mutex::{HandleState, Mutex};
pub use semaphore::Semaphore;

use procsync_common::Result;

/// Lock surface shared by [`Mutex`] and [`Condvar`].
///
/// A condition variable's lock operations are exactly those of its embedded
/// mutex, so code that only needs mutual exclusion can accept either.
pub trait Lockable {
    /// Block until the lock is held by this handle.
    fn lock(&mut self) -> Result<()>;

    /// Take the lock without blocking; fails with `Busy` when held elsewhere.
    fn trylock(&mut self) -> Result<()>;

    /// Release the lock if this handle holds it.
    fn unlock(&mut self) -> Result<()>;

    /// Destroy the underlying primitive and release its shared memory.
    fn destroy(&mut self) -> Result<()>;

    /// Whether this handle believes it holds the lock.
    fn is_locked(&self) -> bool;
}
