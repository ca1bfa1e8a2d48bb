//! procsync platform abstraction traits.
//!
//! This crate defines the small platform surface that the deadline
//! arithmetic depends on, so it can be driven by a fake clock in tests.

#![no_std]

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point on the real-time clock, laid out like `struct timespec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timespec {
    /// Whole seconds since the epoch.
    pub sec: i64,
    /// Nanoseconds past `sec`, in `0..NANOS_PER_SEC` once normalized.
    pub nsec: i64,
}

impl Timespec {
    /// Construct a timespec without normalizing.
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Carry whole seconds out of the nanosecond field.
    pub fn normalized(self) -> Self {
        Self {
            sec: self.sec.saturating_add(self.nsec.div_euclid(NANOS_PER_SEC)),
            nsec: self.nsec.rem_euclid(NANOS_PER_SEC),
        }
    }
}

/// Trait for a wall clock that absolute deadlines are measured against.
pub trait RealtimeClock {
    /// Returns the current real time.
    fn now(&self) -> Timespec;

    /// A short name for logging.
    fn name(&self) -> &'static str;
}

impl<C: RealtimeClock + ?Sized> RealtimeClock for &C {
    fn now(&self) -> Timespec {
        (**self).now()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
