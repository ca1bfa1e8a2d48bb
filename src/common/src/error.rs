//! Error types shared by every procsync primitive.

use core::fmt;

/// Broad classification of a [`SyncError`].
///
/// Callers use the kind to decide whether an operation is worth retrying
/// (`Busy`, `WouldBlock`, `Timeout`) or should be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// The caller passed an argument the operation cannot accept.
    InvalidArgument,
    /// The primitive is held or in use by another party.
    Busy,
    /// A non-blocking operation would have had to block.
    WouldBlock,
    /// A bounded wait reached its deadline.
    Timeout,
    /// Any other failure reported by the operating system.
    OsFailure,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed if retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Busy | ErrorKind::WouldBlock | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::Busy => write!(f, "busy"),
            ErrorKind::WouldBlock => write!(f, "would block"),
            ErrorKind::Timeout => write!(f, "timed out"),
            ErrorKind::OsFailure => write!(f, "os failure"),
        }
    }
}

/// Error returned by primitive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncError {
    /// Usage error detected before any system call was made.
    InvalidArgument(&'static str),
    /// `EBUSY`: held or waited on by another handle.
    Busy,
    /// `EAGAIN`: the semaphore count is currently zero.
    WouldBlock,
    /// `ETIMEDOUT`: the deadline elapsed before a wakeup.
    Timeout,
    /// Any other errno value.
    Os(i32),
}

impl SyncError {
    /// Classify a raw errno value.
    pub fn from_errno(code: i32) -> Self {
        match code {
            libc::EBUSY => SyncError::Busy,
            libc::ETIMEDOUT => SyncError::Timeout,
            // EWOULDBLOCK aliases EAGAIN on every supported target
            libc::EAGAIN => SyncError::WouldBlock,
            code => SyncError::Os(code),
        }
    }

    /// Build an error from the calling thread's current `errno`.
    pub fn last_os_error() -> Self {
        let code = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::EIO);
        Self::from_errno(code)
    }

    /// The classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SyncError::Busy => ErrorKind::Busy,
            SyncError::WouldBlock => ErrorKind::WouldBlock,
            SyncError::Timeout => ErrorKind::Timeout,
            SyncError::Os(_) => ErrorKind::OsFailure,
        }
    }

    /// The errno value conventionally associated with this error.
    ///
    /// Usage errors map to `EINVAL`.
    pub fn code(&self) -> i32 {
        match self {
            SyncError::InvalidArgument(_) => libc::EINVAL,
            SyncError::Busy => libc::EBUSY,
            SyncError::WouldBlock => libc::EAGAIN,
            SyncError::Timeout => libc::ETIMEDOUT,
            SyncError::Os(code) => *code,
        }
    }

    /// Shorthand for `self.kind().is_retryable()`.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// True for the "held elsewhere / try again" conditions that the
    /// binding convention reports through its extra boolean.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy | SyncError::WouldBlock)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            // strerror text, as the OS would describe it
            other => {
                let io = std::io::Error::from_raw_os_error(other.code());
                write!(f, "{}", io)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<SyncError> for std::io::Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidArgument(msg) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
            }
            other => std::io::Error::from_raw_os_error(other.code()),
        }
    }
}

/// Result alias used throughout procsync.
pub type Result<T> = core::result::Result<T, SyncError>;
