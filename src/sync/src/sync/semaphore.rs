//! Counting semaphore reachable only through its handle.
//!
//! The semaphore is created under a random name and the name is unlinked
//! straight away. The kernel keeps the object alive while any handle (or a
//! handle inherited across `fork`) is open, but nothing can open it by name.

use core::fmt;
use core::ffi::CStr;
use core::ptr::NonNull;

use log::{debug, trace, warn};
use procsync_common::{Result, SemaphoreConfig, SyncError};

use super::name;
use crate::sys::cvt_errno;

/// Largest initial count accepted (`SEM_VALUE_MAX` on Linux).
const MAX_INITIAL: u32 = i32::MAX as u32;

/// A counting semaphore usable across processes.
///
/// # Example
///
/// ```no_run
/// use procsync::sync::Semaphore;
///
/// let sem = Semaphore::create(2)?;
/// sem.wait()?;
/// sem.wait()?;
/// assert!(sem.trywait().unwrap_err().is_busy());
/// sem.post()?;
/// # Ok::<(), procsync::SyncError>(())
/// ```
pub struct Semaphore {
    /// `None` once closed.
    sem: Option<NonNull<libc::sem_t>>,
}

// SAFETY: sem_t operations are thread-safe; the only mutation of the handle
// itself (`close`) requires `&mut self`.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Create a semaphore with the given initial count.
    pub fn create(initial: u32) -> Result<Self> {
        Self::with_config(SemaphoreConfig::new(initial))
    }

    /// Create a semaphore from explicit options.
    pub fn with_config(config: SemaphoreConfig) -> Result<Self> {
        if config.initial > MAX_INITIAL {
            return Err(SyncError::InvalidArgument("initial count exceeds SEM_VALUE_MAX"));
        }

        for _ in 0..config.name_attempts.max(1) {
            let name = name::generate(&config.name_prefix)?;

            // SAFETY: name is a valid NUL-terminated string; the variadic
            // arguments are the mode and initial value sem_open expects.
            let sem = unsafe {
                libc::sem_open(
                    name.as_ptr(),
                    libc::O_CREAT | libc::O_EXCL,
                    config.permissions.mode() as libc::c_uint,
                    config.initial as libc::c_uint,
                )
            };

            if sem == libc::SEM_FAILED {
                let err = SyncError::last_os_error();
                if err == SyncError::Os(libc::EEXIST) {
                    debug!("semaphore name {:?} taken, retrying", name);
                    continue;
                }
                return Err(err);
            }

            // SAFETY: sem was just returned by sem_open for this name.
            unsafe { unlink_or_close(sem, &name) }?;

            let sem = NonNull::new(sem).ok_or(SyncError::Os(libc::EINVAL))?;
            debug!(
                "created semaphore at {:p} with count {} (name unlinked)",
                sem, config.initial
            );
            return Ok(Self { sem: Some(sem) });
        }

        Err(SyncError::Os(libc::EEXIST))
    }

    fn raw(&self) -> Result<*mut libc::sem_t> {
        self.sem
            .map(NonNull::as_ptr)
            .ok_or(SyncError::Os(libc::EINVAL))
    }

    /// Block until the count is positive, then decrement it.
    ///
    /// A signal interrupting the wait is reported as `EINTR`.
    pub fn wait(&self) -> Result<()> {
        let sem = self.raw()?;
        // SAFETY: sem is an open semaphore.
        cvt_errno(unsafe { libc::sem_wait(sem) })?;
        trace!("waited on semaphore {:p}", sem);
        Ok(())
    }

    /// Decrement the count if it is positive.
    ///
    /// Fails with [`SyncError::WouldBlock`] when the count is zero.
    pub fn trywait(&self) -> Result<()> {
        let sem = self.raw()?;
        // SAFETY: as in `wait`.
        cvt_errno(unsafe { libc::sem_trywait(sem) })
    }

    /// Increment the count, waking one blocked waiter if any.
    pub fn post(&self) -> Result<()> {
        let sem = self.raw()?;
        // SAFETY: as in `wait`.
        cvt_errno(unsafe { libc::sem_post(sem) })?;
        trace!("posted semaphore {:p}", sem);
        Ok(())
    }

    /// The current count.
    pub fn value(&self) -> Result<u32> {
        let sem = self.raw()?;
        let mut value: libc::c_int = 0;
        // SAFETY: as in `wait`; value is a valid out-pointer.
        cvt_errno(unsafe { libc::sem_getvalue(sem, &mut value) })?;
        // some systems report blocked waiters as a negative count
        Ok(value.max(0) as u32)
    }

    /// Release this handle's reference to the semaphore.
    ///
    /// Closing twice is a no-op. Failures are logged, never reported.
    pub fn close(&mut self) {
        if let Some(sem) = self.sem.take() {
            // SAFETY: sem was open and is forgotten by this handle here.
            if let Err(err) = cvt_errno(unsafe { libc::sem_close(sem.as_ptr()) }) {
                warn!("sem_close on {:p} failed: {}", sem, err);
            } else {
                debug!("closed semaphore at {:p}", sem);
            }
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.sem.is_none()
    }
}

/// Unlink `name`, closing `sem` if that fails so no handle outlives a
/// name that is still reachable.
///
/// # Safety
///
/// `sem` must be an open semaphore that no other handle owns.
unsafe fn unlink_or_close(sem: *mut libc::sem_t, name: &CStr) -> Result<()> {
    if let Err(err) = cvt_errno(libc::sem_unlink(name.as_ptr())) {
        if libc::sem_close(sem) != 0 {
            warn!("closing semaphore {:p} after failed unlink failed", sem);
        }
        return Err(err);
    }
    Ok(())
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sem {
            Some(sem) => write!(f, "procsync.semaphore: {:p}", sem),
            None => write!(f, "procsync.semaphore: (closed)"),
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").field("sem", &self.sem).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_count_admits_exactly_n_waits() {
        for n in [0u32, 1, 2, 5, 17] {
            let sem = Semaphore::create(n).unwrap();
            assert_eq!(sem.value().unwrap(), n);
            for _ in 0..n {
                sem.wait().unwrap();
            }
            let err = sem.trywait().unwrap_err();
            assert_eq!(err, SyncError::WouldBlock);
            assert!(err.is_busy());
        }
    }

    #[test]
    fn test_post_then_trywait() {
        let sem = Semaphore::create(0).unwrap();
        sem.post().unwrap();
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 2);
        sem.trywait().unwrap();
        sem.trywait().unwrap();
        assert_eq!(sem.trywait(), Err(SyncError::WouldBlock));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut sem = Semaphore::create(1).unwrap();
        sem.close();
        assert!(sem.is_closed());
        sem.close();

        assert_eq!(sem.wait(), Err(SyncError::Os(libc::EINVAL)));
        assert_eq!(sem.post(), Err(SyncError::Os(libc::EINVAL)));
        assert_eq!(sem.to_string(), "procsync.semaphore: (closed)");
    }

    #[test]
    fn test_with_config() {
        let cfg = SemaphoreConfig::new(3).name_prefix("cfg/test");
        let sem = Semaphore::with_config(cfg).unwrap();
        assert_eq!(sem.value().unwrap(), 3);
        assert!(sem.to_string().starts_with("procsync.semaphore: 0x"));
    }

    #[test]
    fn test_initial_count_too_large() {
        let err = Semaphore::create(u32::MAX).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_wait_released_by_post_from_thread() {
        let sem = Arc::new(Semaphore::create(0).unwrap());
        let poster = Arc::clone(&sem);

        let handle = thread::spawn(move || {
            poster.post().unwrap();
        });

        sem.wait().unwrap();
        handle.join().unwrap();
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[test]
    fn test_failed_unlink_closes_semaphore() {
        let name = name::generate("procsync-test").unwrap();
        // SAFETY: a fresh name with mode and initial value supplied.
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        assert_ne!(sem, libc::SEM_FAILED);

        // unlinking a second time fails, as if the name had been taken away
        assert_eq!(unsafe { libc::sem_unlink(name.as_ptr()) }, 0);
        let err = unsafe { unlink_or_close(sem, &name) }.unwrap_err();
        assert_eq!(err, SyncError::Os(libc::ENOENT));
    }
}
