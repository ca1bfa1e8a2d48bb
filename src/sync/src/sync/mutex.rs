//! Process-shared mutex.
//!
//! The `pthread_mutex_t` lives in a [`SharedRegion`] initialized with
//! `PTHREAD_PROCESS_SHARED`, so any process that inherits the mapping can
//! lock it. Each [`Mutex`] handle additionally carries a `locked` flag
//! recording whether that handle currently holds the lock.

use core::fmt;

use log::{debug, trace, warn};
use procsync_common::{Result, SyncError};

use super::Lockable;
use crate::shm::SharedRegion;
use crate::sys::{cvt, init_shared_mutex};

/// Observable state of a lock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Initialized and not held by this handle.
    Ready,
    /// Held by this handle.
    Locked,
    /// Destroyed through this handle; every operation now fails.
    Destroyed,
}

/// A mutual exclusion lock usable across processes.
///
/// # Example
///
/// ```no_run
/// use procsync::sync::Mutex;
///
/// let mut mutex = Mutex::create()?;
/// mutex.lock()?;
/// // ... critical section, possibly in a forked child ...
/// mutex.unlock()?;
/// mutex.destroy()?;
/// # Ok::<(), procsync::SyncError>(())
/// ```
pub struct Mutex {
    /// `None` once destroyed.
    raw: Option<SharedRegion<libc::pthread_mutex_t>>,
    /// Whether this handle holds the lock.
    locked: bool,
}

impl Mutex {
    /// Allocate and initialize a new process-shared mutex.
    pub fn create() -> Result<Self> {
        let region = SharedRegion::<libc::pthread_mutex_t>::allocate()?;

        // SAFETY: the region is freshly mapped, writable and sized for a
        // pthread_mutex_t; mmap returns page-aligned memory.
        if let Err(err) = unsafe { init_shared_mutex(region.as_ptr()) } {
            region.release();
            return Err(err);
        }

        debug!("created shared mutex at {:p}", region.as_ptr());
        Ok(Self {
            raw: Some(region),
            locked: false,
        })
    }

    /// A second, independent handle onto the same mutex.
    ///
    /// The new handle starts out not holding the lock regardless of this
    /// handle's state.
    ///
    /// # Safety
    ///
    /// Once any handle destroys the mutex, every other handle refers to
    /// unmapped memory. The caller must not use the returned handle (or this
    /// one) after the other has been destroyed.
    pub unsafe fn share(&self) -> Result<Self> {
        let region = self.region()?;
        Ok(Self {
            raw: Some(region.alias()),
            locked: false,
        })
    }

    fn region(&self) -> Result<&SharedRegion<libc::pthread_mutex_t>> {
        // a destroyed handle reports EINVAL, as pthread would for an
        // uninitialized mutex
        self.raw.as_ref().ok_or(SyncError::Os(libc::EINVAL))
    }

    pub(crate) fn as_raw(&self) -> Result<*mut libc::pthread_mutex_t> {
        self.region().map(SharedRegion::as_ptr)
    }

    /// Block until the mutex is acquired.
    ///
    /// If this handle already holds the lock, returns immediately without
    /// touching the kernel object. This is not recursive locking: a single
    /// `unlock` fully releases the mutex.
    pub fn lock(&mut self) -> Result<()> {
        let raw = self.as_raw()?;
        if !self.locked {
            // SAFETY: raw points to an initialized, mapped pthread_mutex_t.
            cvt(unsafe { libc::pthread_mutex_lock(raw) })?;
            self.locked = true;
            trace!("locked mutex {:p}", raw);
        }
        Ok(())
    }

    /// Acquire the mutex without blocking.
    ///
    /// Fails with [`SyncError::Busy`] when another handle holds the lock.
    pub fn trylock(&mut self) -> Result<()> {
        let raw = self.as_raw()?;
        if !self.locked {
            // SAFETY: as in `lock`.
            cvt(unsafe { libc::pthread_mutex_trylock(raw) })?;
            self.locked = true;
            trace!("trylocked mutex {:p}", raw);
        }
        Ok(())
    }

    /// Release the mutex if this handle holds it; otherwise a no-op.
    pub fn unlock(&mut self) -> Result<()> {
        let raw = self.as_raw()?;
        if self.locked {
            // SAFETY: as in `lock`; this handle holds the lock.
            cvt(unsafe { libc::pthread_mutex_unlock(raw) })?;
            self.locked = false;
            trace!("unlocked mutex {:p}", raw);
        }
        Ok(())
    }

    /// Destroy the mutex and unmap its control block.
    ///
    /// A lock held by this handle is released first. If another handle still
    /// holds it, fails with [`SyncError::Busy`] and leaves the mutex usable.
    /// Destroying an already destroyed handle succeeds. Once the mutex
    /// itself is destroyed, a failure to unmap the control block is logged
    /// and does not fail the call.
    pub fn destroy(&mut self) -> Result<()> {
        let raw = match self.raw.as_ref() {
            Some(region) => region.as_ptr(),
            None => return Ok(()),
        };

        if self.locked {
            self.locked = false;
            // SAFETY: as in `unlock`.
            if let Err(err) = cvt(unsafe { libc::pthread_mutex_unlock(raw) }) {
                warn!("unlock before destroy of mutex {:p} failed: {}", raw, err);
            }
        }

        // SAFETY: raw points to an initialized pthread_mutex_t that this
        // handle does not hold.
        cvt(unsafe { libc::pthread_mutex_destroy(raw) })?;

        // The kernel object is gone, so the handle is destroyed whatever
        // happens to the mapping.
        if let Some(region) = self.raw.take() {
            region.release();
        }
        debug!("destroyed shared mutex at {:p}", raw);
        Ok(())
    }

    /// Whether this handle believes it holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether this handle has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.raw.is_none()
    }

    /// Current state of this handle.
    pub fn state(&self) -> HandleState {
        match (&self.raw, self.locked) {
            (None, _) => HandleState::Destroyed,
            (Some(_), true) => HandleState::Locked,
            (Some(_), false) => HandleState::Ready,
        }
    }

    /// Release a held lock while the handle goes away. Never destroys.
    pub(crate) fn release_on_drop(&mut self) {
        if !self.locked {
            return;
        }
        self.locked = false;
        if let Some(region) = self.raw.as_ref() {
            // SAFETY: as in `unlock`.
            if let Err(err) = cvt(unsafe { libc::pthread_mutex_unlock(region.as_ptr()) }) {
                warn!("unlock of mutex {:p} on drop failed: {}", region.as_ptr(), err);
            }
        }
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        self.release_on_drop();
    }
}

impl Lockable for Mutex {
    fn lock(&mut self) -> Result<()> {
        Mutex::lock(self)
    }

    fn trylock(&mut self) -> Result<()> {
        Mutex::trylock(self)
    }

    fn unlock(&mut self) -> Result<()> {
        Mutex::unlock(self)
    }

    fn destroy(&mut self) -> Result<()> {
        Mutex::destroy(self)
    }

    fn is_locked(&self) -> bool {
        Mutex::is_locked(self)
    }
}

impl fmt::Display for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(region) => write!(f, "procsync.mutex: {:p}", region.as_ptr()),
            None => write!(f, "procsync.mutex: (destroyed)"),
        }
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("raw", &self.raw)
            .field("locked", &self.locked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_unlock_clears_flag() {
        let mut m = Mutex::create().expect("create mutex");
        assert_eq!(m.state(), HandleState::Ready);

        m.lock().unwrap();
        assert!(m.is_locked());
        assert_eq!(m.state(), HandleState::Locked);

        m.unlock().unwrap();
        assert!(!m.is_locked());

        // second unlock is a no-op
        m.unlock().unwrap();
        assert!(!m.is_locked());

        m.destroy().unwrap();
    }

    #[test]
    fn test_relock_same_handle_does_not_block() {
        let mut m = Mutex::create().unwrap();
        m.lock().unwrap();
        m.lock().unwrap();
        m.trylock().unwrap();
        assert!(m.is_locked());

        // a single unlock releases the kernel lock
        m.unlock().unwrap();
        let mut other = unsafe { m.share() }.unwrap();
        other.trylock().unwrap();
        other.unlock().unwrap();

        drop(other);
        m.destroy().unwrap();
    }

    #[test]
    fn test_trylock_busy_when_held_by_other_handle() {
        let mut a = Mutex::create().unwrap();
        let mut b = unsafe { a.share() }.unwrap();

        a.lock().unwrap();
        let err = b.trylock().unwrap_err();
        assert_eq!(err, SyncError::Busy);
        assert!(err.is_busy());
        assert!(!b.is_locked());

        a.unlock().unwrap();
        b.trylock().unwrap();
        assert!(b.is_locked());
        b.unlock().unwrap();

        drop(b);
        a.destroy().unwrap();
    }

    #[test]
    fn test_destroy_while_held_by_self() {
        let mut m = Mutex::create().unwrap();
        m.lock().unwrap();
        m.destroy().unwrap();
        assert!(!m.is_locked());
        assert_eq!(m.state(), HandleState::Destroyed);
    }

    #[test]
    fn test_destroy_while_held_by_other_is_busy() {
        let mut a = Mutex::create().unwrap();
        let mut b = unsafe { a.share() }.unwrap();

        a.lock().unwrap();
        assert_eq!(b.destroy(), Err(SyncError::Busy));
        assert!(!b.is_destroyed());

        // still usable
        a.unlock().unwrap();
        b.lock().unwrap();
        b.unlock().unwrap();

        drop(b);
        a.destroy().unwrap();
    }

    #[test]
    fn test_operations_after_destroy_fail() {
        let mut m = Mutex::create().unwrap();
        m.destroy().unwrap();

        assert_eq!(m.lock(), Err(SyncError::Os(libc::EINVAL)));
        assert_eq!(m.trylock(), Err(SyncError::Os(libc::EINVAL)));
        assert_eq!(m.unlock(), Err(SyncError::Os(libc::EINVAL)));
        assert!(unsafe { m.share() }.is_err());

        // repeated destroy is fine
        m.destroy().unwrap();
        assert_eq!(m.to_string(), "procsync.mutex: (destroyed)");
    }

    #[test]
    fn test_drop_releases_held_lock() {
        let mut a = Mutex::create().unwrap();
        let mut b = unsafe { a.share() }.unwrap();

        b.lock().unwrap();
        drop(b);

        a.trylock().unwrap();
        a.destroy().unwrap();
    }

    #[test]
    fn test_display_shows_address() {
        let mut m = Mutex::create().unwrap();
        assert!(m.to_string().starts_with("procsync.mutex: 0x"));
        m.destroy().unwrap();
    }

    #[test]
    fn test_generic_over_lockable() {
        fn exercise<L: Lockable>(l: &mut L) {
            l.lock().unwrap();
            assert!(l.is_locked());
            l.unlock().unwrap();
            l.destroy().unwrap();
        }

        let mut m = Mutex::create().unwrap();
        exercise(&mut m);
    }
}
