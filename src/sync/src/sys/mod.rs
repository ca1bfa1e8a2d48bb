//! Thin wrappers over the libc calls the primitives are built on.

use core::mem::MaybeUninit;

use procsync_common::{Result, SyncError};

pub mod clock;

/// Convert a pthread-style return code (0 or an errno value) into a result.
#[inline]
pub fn cvt(rc: libc::c_int) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(SyncError::from_errno(rc))
    }
}

/// Convert a `-1`-and-`errno` style return code into a result.
#[inline]
pub fn cvt_errno(rc: libc::c_int) -> Result<()> {
    if rc == -1 {
        Err(SyncError::last_os_error())
    } else {
        Ok(())
    }
}

/// Initialize a mutex control block for use across processes.
///
/// # Safety
///
/// `mutex` must point to writable, suitably aligned memory for a
/// `pthread_mutex_t` that is not currently initialized.
pub unsafe fn init_shared_mutex(mutex: *mut libc::pthread_mutex_t) -> Result<()> {
    let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
    cvt(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;

    let rc = cvt(libc::pthread_mutexattr_setpshared(
        attr.as_mut_ptr(),
        libc::PTHREAD_PROCESS_SHARED,
    ))
    .and_then(|()| cvt(libc::pthread_mutex_init(mutex, attr.as_ptr())));

    libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
    rc
}

/// Initialize a condition variable control block for use across processes.
///
/// # Safety
///
/// `cond` must point to writable, suitably aligned memory for a
/// `pthread_cond_t` that is not currently initialized.
pub unsafe fn init_shared_cond(cond: *mut libc::pthread_cond_t) -> Result<()> {
    let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
    cvt(libc::pthread_condattr_init(attr.as_mut_ptr()))?;

    let rc = cvt(libc::pthread_condattr_setpshared(
        attr.as_mut_ptr(),
        libc::PTHREAD_PROCESS_SHARED,
    ))
    .and_then(|()| cvt(libc::pthread_cond_init(cond, attr.as_ptr())));

    libc::pthread_condattr_destroy(attr.as_mut_ptr());
    rc
}
