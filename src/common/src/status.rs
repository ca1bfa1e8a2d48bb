//! Out-of-band result shape for host bindings.
//!
//! A scripting binding reports every call as a success flag, an optional
//! human-readable message and, for the operations that can fail with a
//! "held elsewhere" condition, a second flag telling callers whether a
//! retry makes sense.

use core::fmt;

use crate::error::SyncError;

/// Outcome of one primitive call, flattened for a host language.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallStatus {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Description of the failure, derived from the OS error code.
    pub message: Option<String>,
    /// For busy-reporting operations that failed: whether the failure was
    /// the retryable busy / would-block condition.
    pub busy: Option<bool>,
}

impl CallStatus {
    /// A successful call.
    pub fn success() -> Self {
        Self {
            ok: true,
            message: None,
            busy: None,
        }
    }

    /// Flatten a result from an operation that does not report busy.
    pub fn from_result<T>(result: &Result<T, SyncError>) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(err) => Self {
                ok: false,
                message: Some(err.to_string()),
                busy: None,
            },
        }
    }

    /// Flatten a result from `trylock`, `trywait` or `destroy`, which add
    /// the busy flag on failure.
    pub fn with_busy_flag<T>(result: &Result<T, SyncError>) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(err) => Self {
                ok: false,
                message: Some(err.to_string()),
                busy: Some(err.is_busy()),
            },
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.busy) {
            (None, _) if self.ok => write!(f, "ok"),
            (Some(msg), Some(true)) => write!(f, "failed (busy): {}", msg),
            (Some(msg), _) => write!(f, "failed: {}", msg),
            (None, _) => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_extras() {
        let status = CallStatus::with_busy_flag(&Ok::<(), SyncError>(()));
        assert!(status.ok);
        assert_eq!(status.message, None);
        assert_eq!(status.busy, None);
        assert_eq!(status.to_string(), "ok");
    }

    #[test]
    fn test_busy_flag_only_when_requested() {
        let err: Result<(), SyncError> = Err(SyncError::Busy);

        let plain = CallStatus::from_result(&err);
        assert!(!plain.ok);
        assert_eq!(plain.busy, None);

        let flagged = CallStatus::with_busy_flag(&err);
        assert_eq!(flagged.busy, Some(true));
        assert!(flagged.message.is_some());
    }

    #[test]
    fn test_hard_failure_is_not_busy() {
        let err: Result<(), SyncError> = Err(SyncError::Os(libc::EINVAL));
        let status = CallStatus::with_busy_flag(&err);
        assert_eq!(status.busy, Some(false));
        assert!(status.to_string().starts_with("failed: "));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_keeps_message_and_busy_flag() {
        let status = CallStatus::with_busy_flag(&Err::<(), _>(SyncError::Busy));
        let json = serde_json::to_string(&status).unwrap();
        let back: CallStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
        assert_eq!(back.busy, Some(true));
    }
}
