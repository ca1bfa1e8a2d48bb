//! Shared anonymous mappings used as control-block storage.
//!
//! A [`SharedRegion<T>`] is exactly `size_of::<T>()` bytes of zeroed memory
//! mapped `MAP_SHARED | MAP_ANONYMOUS`. The mapping is inherited across
//! `fork`, so every process descending from the allocating one sees the same
//! physical pages at the same address.
//!
//! There is no reference counting. A region is released only by an explicit
//! [`SharedRegion::free`]; dropping the value leaves the mapping in place,
//! because other processes may still be using it.

use core::fmt;
use core::marker::PhantomData;
use core::mem::size_of;
use core::ptr::{self, NonNull};

use log::{trace, warn};
use procsync_common::{Result, SyncError};
use rustix::mm::{mmap_anonymous, munmap, MapFlags, ProtFlags};

/// A fixed-size shared mapping holding one `T`.
pub struct SharedRegion<T> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

// SAFETY: The region is plain memory owned by the mapping, not by any thread.
// Moving the handle to another thread is fine whenever T itself may move.
unsafe impl<T: Send> Send for SharedRegion<T> {}

impl<T> SharedRegion<T> {
    /// Map a fresh zero-filled region large enough for one `T`.
    pub fn allocate() -> Result<Self> {
        let len = size_of::<T>();
        if len == 0 {
            return Err(SyncError::InvalidArgument("cannot map a zero-sized region"));
        }

        // SAFETY: A null hint asks the kernel to choose a fresh address, so the
        // mapping cannot alias any existing Rust object. Anonymous mappings
        // are zero-filled by the kernel.
        let addr = unsafe {
            mmap_anonymous(
                ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
            )
        }
        .map_err(|e| SyncError::from_errno(e.raw_os_error()))?;

        let ptr = NonNull::new(addr.cast::<T>())
            .ok_or(SyncError::Os(libc::ENOMEM))?;
        trace!("mapped {} shared bytes at {:p}", len, ptr);

        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Raw pointer to the control block.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// A second handle onto the same mapping.
    ///
    /// # Safety
    ///
    /// The caller must ensure that at most one of the aliases is ever passed
    /// to [`free`](Self::free), and that none is dereferenced afterwards.
    pub(crate) unsafe fn alias(&self) -> Self {
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Unmap the region in this process.
    ///
    /// Other processes that inherited the mapping keep their view of it.
    pub fn free(self) -> Result<()> {
        // SAFETY: ptr and len describe exactly the mapping created in
        // `allocate`, and `self` is consumed so this handle cannot be
        // used again.
        unsafe { munmap(self.ptr.as_ptr().cast(), size_of::<T>()) }
            .map_err(|e| SyncError::from_errno(e.raw_os_error()))?;
        trace!("unmapped shared region at {:p}", self.ptr);
        Ok(())
    }

    /// [`free`](Self::free) for cleanup paths that have no caller to report to.
    pub(crate) fn release(self) {
        let addr = self.ptr;
        if let Err(err) = self.free() {
            warn!("failed to unmap shared region at {:p}: {}", addr, err);
        }
    }
}

impl<T> fmt::Debug for SharedRegion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("ptr", &self.ptr)
            .field("len", &size_of::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_region_is_zeroed() {
        let region = SharedRegion::<[u8; 64]>::allocate().expect("map region");
        // SAFETY: the region is live and sized for [u8; 64].
        let bytes = unsafe { &*region.as_ptr() };
        assert!(bytes.iter().all(|&b| b == 0));
        region.free().expect("unmap region");
    }

    #[test]
    fn test_region_is_writable() {
        let region = SharedRegion::<AtomicU64>::allocate().expect("map region");
        // SAFETY: the region is live, zeroed, and zero is a valid AtomicU64.
        let counter = unsafe { &*region.as_ptr() };
        counter.fetch_add(7, Ordering::SeqCst);
        assert_eq!(counter.load(Ordering::SeqCst), 7);
        region.free().expect("unmap region");
    }

    #[test]
    fn test_zero_sized_region_rejected() {
        let err = SharedRegion::<()>::allocate().unwrap_err();
        assert_eq!(err.kind(), procsync_common::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_region_visible_across_fork() {
        let region = SharedRegion::<AtomicU64>::allocate().expect("map region");
        // SAFETY: as above.
        let counter = unsafe { &*region.as_ptr() };

        // SAFETY: the child only touches the shared atomic and exits.
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0, "fork failed");
        if pid == 0 {
            counter.store(42, Ordering::SeqCst);
            unsafe { libc::_exit(0) };
        }

        let mut status = 0;
        // SAFETY: pid is our child.
        unsafe { libc::waitpid(pid, &mut status, 0) };
        assert_eq!(counter.load(Ordering::SeqCst), 42);
        region.free().expect("unmap region");
    }

    #[test]
    fn test_release_swallows_unmap_failure() {
        // Not page aligned, so munmap rejects it without touching memory.
        let bogus = SharedRegion::<u64> {
            ptr: NonNull::dangling(),
            _marker: PhantomData,
        };
        assert_eq!(bogus.free(), Err(SyncError::Os(libc::EINVAL)));

        let bogus = SharedRegion::<u64> {
            ptr: NonNull::dangling(),
            _marker: PhantomData,
        };
        bogus.release();
    }
}
