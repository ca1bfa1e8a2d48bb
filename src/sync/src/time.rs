//! Relative-timeout to absolute-deadline conversion.
//!
//! `pthread_cond_timedwait` takes an absolute `CLOCK_REALTIME` deadline,
//! while callers think in "seconds from now". The integer part of the
//! timeout is added to the seconds field, the fractional part becomes
//! nanoseconds, and any nanosecond overflow is carried into seconds.

use procsync_common::{Result, SyncError};
use procsync_hal::{RealtimeClock, Timespec, NANOS_PER_SEC};

/// Reject timeouts that cannot describe a point in the future.
pub fn check_timeout(seconds: f64) -> Result<()> {
    if seconds.is_nan() {
        return Err(SyncError::InvalidArgument("seconds must be a number"));
    }
    if seconds < 0.0 {
        return Err(SyncError::InvalidArgument("seconds must be greater or equal to 0"));
    }
    Ok(())
}

/// `base + seconds`, normalized. `seconds` must already be validated.
///
/// Timeouts too large for the seconds field saturate.
pub fn add_seconds(base: Timespec, seconds: f64) -> Timespec {
    let whole = seconds.trunc();
    let frac = seconds - whole;

    // float-to-int casts saturate, so +inf becomes i64::MAX
    let whole = whole as i64;
    let frac_ns = (frac * NANOS_PER_SEC as f64) as i64;

    Timespec::new(base.sec.saturating_add(whole), base.nsec + frac_ns).normalized()
}

/// The absolute deadline `seconds` from now on `clock`.
pub fn deadline_after<C: RealtimeClock + ?Sized>(clock: &C, seconds: f64) -> Result<Timespec> {
    check_timeout(seconds)?;
    Ok(add_seconds(clock.now(), seconds))
}

/// Convert to the libc representation.
///
/// Seconds beyond the range of `time_t` clamp to its maximum, so a huge
/// deadline stays in the future on targets with a 32-bit `time_t`.
pub fn to_libc(ts: Timespec) -> libc::timespec {
    // SAFETY: an all-zero timespec is valid; some targets carry padding
    // fields that rule out a struct literal.
    let mut out: libc::timespec = unsafe { core::mem::zeroed() };
    out.tv_sec = libc::time_t::try_from(ts.sec).unwrap_or(libc::time_t::MAX);
    out.tv_nsec = ts.nsec as _;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Clock pinned to a fixed instant that counts how often it is read.
    struct FixedClock {
        at: Timespec,
        reads: Cell<u32>,
    }

    impl FixedClock {
        fn new(sec: i64, nsec: i64) -> Self {
            Self {
                at: Timespec::new(sec, nsec),
                reads: Cell::new(0),
            }
        }
    }

    impl RealtimeClock for FixedClock {
        fn now(&self) -> Timespec {
            self.reads.set(self.reads.get() + 1);
            self.at
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn test_whole_seconds() {
        let clock = FixedClock::new(100, 250);
        let d = deadline_after(&clock, 3.0).unwrap();
        assert_eq!(d, Timespec::new(103, 250));
    }

    #[test]
    fn test_fraction_becomes_nanoseconds() {
        let clock = FixedClock::new(100, 0);
        let d = deadline_after(&clock, 1.5).unwrap();
        assert_eq!(d, Timespec::new(101, 500_000_000));
    }

    #[test]
    fn test_nanosecond_overflow_carries() {
        let clock = FixedClock::new(100, 800_000_000);
        let d = deadline_after(&clock, 2.25).unwrap();
        assert_eq!(d, Timespec::new(103, 50_000_000));
    }

    #[test]
    fn test_exact_second_boundary_carries() {
        let clock = FixedClock::new(5, 500_000_000);
        let d = deadline_after(&clock, 0.5).unwrap();
        assert_eq!(d, Timespec::new(6, 0));
    }

    #[test]
    fn test_zero_timeout_is_now() {
        let clock = FixedClock::new(42, 17);
        assert_eq!(deadline_after(&clock, 0.0).unwrap(), Timespec::new(42, 17));
    }

    #[test]
    fn test_negative_rejected_before_clock_read() {
        let clock = FixedClock::new(1, 0);
        let err = deadline_after(&clock, -0.001).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
        assert_eq!(clock.reads.get(), 0);
    }

    #[test]
    fn test_nan_rejected() {
        let clock = FixedClock::new(1, 0);
        assert!(deadline_after(&clock, f64::NAN).is_err());
        assert_eq!(clock.reads.get(), 0);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let d = add_seconds(Timespec::new(1_000, 0), f64::INFINITY);
        assert_eq!(d.sec, i64::MAX);
    }

    #[test]
    fn test_to_libc() {
        let ts = to_libc(Timespec::new(9, 123));
        assert_eq!(ts.tv_sec, 9);
        assert_eq!(ts.tv_nsec, 123);
    }

    #[test]
    fn test_to_libc_clamps_far_deadline() {
        let far = add_seconds(Timespec::new(1_000, 0), f64::INFINITY);
        let ts = to_libc(far);
        assert_eq!(ts.tv_sec, libc::time_t::MAX);
        assert!(ts.tv_sec > 0);

        let ts = to_libc(add_seconds(Timespec::new(1_000, 0), 1e12));
        assert!(ts.tv_sec > 1_000);
    }
}
