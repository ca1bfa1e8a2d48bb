//! Process-shared condition variable.
//!
//! A [`Condvar`] owns its own [`Mutex`]; `lock`, `trylock` and `unlock` are
//! the mutex's operations, and `wait`/`timedwait` atomically release and
//! re-acquire that same mutex.

use core::fmt;
use std::time::Duration;

use log::{debug, trace, warn};
use procsync_common::{ClockSource, CondvarConfig, Result, SyncError};

use super::{Lockable, Mutex};
use crate::shm::SharedRegion;
use crate::sys::clock::clock_for;
use crate::sys::{cvt, init_shared_cond};
use crate::time::{check_timeout, deadline_after, to_libc};

/// A condition variable usable across processes.
///
/// # Example
///
/// ```no_run
/// use procsync::sync::Condvar;
///
/// let mut cond = Condvar::create()?;
/// cond.lock()?;
/// // wait up to 1.5 seconds for another process to signal
/// let _ = cond.timedwait(1.5);
/// cond.unlock()?;
/// # Ok::<(), procsync::SyncError>(())
/// ```
pub struct Condvar {
    mutex: Mutex,
    /// `None` once destroyed.
    cond: Option<SharedRegion<libc::pthread_cond_t>>,
    clock: ClockSource,
}

impl Condvar {
    /// Allocate a condition variable and its mutex with default options.
    pub fn create() -> Result<Self> {
        Self::with_config(CondvarConfig::default())
    }

    /// Allocate a condition variable and its mutex.
    pub fn with_config(config: CondvarConfig) -> Result<Self> {
        let mut mutex = Mutex::create()?;

        let region = match SharedRegion::<libc::pthread_cond_t>::allocate() {
            Ok(region) => region,
            Err(err) => {
                discard(&mut mutex);
                return Err(err);
            }
        };

        // SAFETY: freshly mapped, writable, page-aligned and sized for a
        // pthread_cond_t.
        if let Err(err) = unsafe { init_shared_cond(region.as_ptr()) } {
            region.release();
            discard(&mut mutex);
            return Err(err);
        }

        debug!(
            "created shared condvar at {:p} (clock {:?})",
            region.as_ptr(),
            config.clock
        );
        Ok(Self {
            mutex,
            cond: Some(region),
            clock: config.clock,
        })
    }

    /// A second, independent handle onto the same condition variable.
    ///
    /// # Safety
    ///
    /// Same contract as [`Mutex::share`]: neither handle may be used after
    /// the other has destroyed the primitive.
    pub unsafe fn share(&self) -> Result<Self> {
        let cond = self.region()?.alias();
        let mutex = self.mutex.share()?;
        Ok(Self {
            mutex,
            cond: Some(cond),
            clock: self.clock,
        })
    }

    fn region(&self) -> Result<&SharedRegion<libc::pthread_cond_t>> {
        self.cond.as_ref().ok_or(SyncError::Os(libc::EINVAL))
    }

    fn raw(&self) -> Result<*mut libc::pthread_cond_t> {
        self.region().map(SharedRegion::as_ptr)
    }

    /// Control blocks for a wait, which requires holding the lock.
    fn wait_target(&self) -> Result<(*mut libc::pthread_cond_t, *mut libc::pthread_mutex_t)> {
        let cond = self.raw()?;
        let mutex = self.mutex.as_raw()?;
        if !self.mutex.is_locked() {
            // what an error-checking mutex reports for a wait without the lock
            return Err(SyncError::Os(libc::EPERM));
        }
        Ok((cond, mutex))
    }

    /// Acquire the embedded mutex. See [`Mutex::lock`].
    pub fn lock(&mut self) -> Result<()> {
        self.mutex.lock()
    }

    /// Acquire the embedded mutex without blocking. See [`Mutex::trylock`].
    pub fn trylock(&mut self) -> Result<()> {
        self.mutex.trylock()
    }

    /// Release the embedded mutex. See [`Mutex::unlock`].
    pub fn unlock(&mut self) -> Result<()> {
        self.mutex.unlock()
    }

    /// Wake at most one waiter.
    pub fn signal(&self) -> Result<()> {
        let cond = self.raw()?;
        // SAFETY: cond points to an initialized, mapped pthread_cond_t.
        cvt(unsafe { libc::pthread_cond_signal(cond) })?;
        trace!("signaled condvar {:p}", cond);
        Ok(())
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) -> Result<()> {
        let cond = self.raw()?;
        // SAFETY: as in `signal`.
        cvt(unsafe { libc::pthread_cond_broadcast(cond) })?;
        trace!("broadcast condvar {:p}", cond);
        Ok(())
    }

    /// Release the lock, block until signaled, and re-acquire the lock.
    ///
    /// The handle must hold the lock; otherwise fails with `EPERM` without
    /// waiting. The lock is held again when this returns, including on
    /// error.
    pub fn wait(&mut self) -> Result<()> {
        let (cond, mutex) = self.wait_target()?;
        trace!("waiting on condvar {:p}", cond);
        // SAFETY: both pointers refer to initialized, mapped control blocks
        // and this handle holds the mutex.
        cvt(unsafe { libc::pthread_cond_wait(cond, mutex) })
    }

    /// Like [`wait`](Self::wait), but gives up `seconds` from now.
    ///
    /// Fails with [`SyncError::Timeout`] when the deadline passes first and
    /// with [`SyncError::InvalidArgument`] for a negative or NaN timeout,
    /// which is checked before anything else.
    pub fn timedwait(&mut self, seconds: f64) -> Result<()> {
        check_timeout(seconds)?;
        let (cond, mutex) = self.wait_target()?;

        let clock = clock_for(self.clock);
        let deadline = deadline_after(clock, seconds)?;
        trace!(
            "waiting on condvar {:p} until {}.{:09} ({})",
            cond,
            deadline.sec,
            deadline.nsec,
            clock.name()
        );

        let abstime = to_libc(deadline);
        // SAFETY: as in `wait`; abstime outlives the call.
        cvt(unsafe { libc::pthread_cond_timedwait(cond, mutex, &abstime) })
    }

    /// [`timedwait`](Self::timedwait) taking a [`Duration`].
    pub fn timedwait_duration(&mut self, timeout: Duration) -> Result<()> {
        self.timedwait(timeout.as_secs_f64())
    }

    /// Destroy the condition variable, then its mutex.
    ///
    /// Fails with [`SyncError::Busy`] without touching the mutex if a waiter
    /// is still blocked. If the condition block is destroyed but the mutex
    /// turns out to be held by another handle, the condition block is
    /// re-initialized in place and `Busy` is returned, leaving both usable.
    /// Destroying an already destroyed handle succeeds.
    ///
    /// Should that re-initialization fail, the condition block is released
    /// while the mutex stays live: condition operations fail with `EINVAL`,
    /// the lock operations keep working and [`is_destroyed`](Self::is_destroyed)
    /// stays false until a later `destroy` takes the mutex down too.
    pub fn destroy(&mut self) -> Result<()> {
        let cond = match self.cond.as_ref() {
            Some(region) => region.as_ptr(),
            None => return self.mutex.destroy(),
        };

        // SAFETY: cond points to an initialized, mapped pthread_cond_t.
        cvt(unsafe { libc::pthread_cond_destroy(cond) })?;

        if let Err(err) = self.mutex.destroy() {
            // SAFETY: the block was destroyed just above and is still mapped.
            if let Err(reinit) = unsafe { init_shared_cond(cond) } {
                warn!("re-initializing condvar {:p} failed: {}", cond, reinit);
                if let Some(region) = self.cond.take() {
                    region.release();
                }
            }
            return Err(err);
        }

        if let Some(region) = self.cond.take() {
            region.release();
        }
        debug!("destroyed shared condvar at {:p}", cond);
        Ok(())
    }

    /// Whether this handle believes it holds the lock.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Whether this handle has been fully destroyed, mutex included.
    pub fn is_destroyed(&self) -> bool {
        self.cond.is_none() && self.mutex.is_destroyed()
    }
}

/// Tear down the mutex of a condvar that failed to come up.
fn discard(mutex: &mut Mutex) {
    if let Err(err) = mutex.destroy() {
        warn!("failed to destroy mutex of half-built condvar: {}", err);
    }
}

impl Lockable for Condvar {
    fn lock(&mut self) -> Result<()> {
        Condvar::lock(self)
    }

    fn trylock(&mut self) -> Result<()> {
        Condvar::trylock(self)
    }

    fn unlock(&mut self) -> Result<()> {
        Condvar::unlock(self)
    }

    fn destroy(&mut self) -> Result<()> {
        Condvar::destroy(self)
    }

    fn is_locked(&self) -> bool {
        Condvar::is_locked(self)
    }
}

impl fmt::Display for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cond {
            Some(region) => write!(f, "procsync.cond: {:p}", region.as_ptr()),
            None => write!(f, "procsync.cond: (destroyed)"),
        }
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar")
            .field("mutex", &self.mutex)
            .field("cond", &self.cond)
            .field("clock", &self.clock)
            .finish()
    }
}
