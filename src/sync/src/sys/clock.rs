//! Real-time clocks for building absolute deadlines.

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use procsync_common::ClockSource;
use procsync_hal::{RealtimeClock, Timespec};
use spin::Once;

/// `CLOCK_REALTIME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreciseClock;

/// `CLOCK_REALTIME_COARSE` where the platform has it.
///
/// Cheaper to read than [`PreciseClock`] at the cost of tick resolution.
/// Falls back to the precise clock when the coarse one is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoarseClock;

#[cfg(any(target_os = "linux", target_os = "android"))]
const COARSE_ID: Option<libc::clockid_t> = Some(libc::CLOCK_REALTIME_COARSE);
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const COARSE_ID: Option<libc::clockid_t> = None;

fn read(id: libc::clockid_t) -> Option<Timespec> {
    // SAFETY: an all-zero timespec is a valid value.
    let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
    // SAFETY: ts is a valid out-pointer for the duration of the call.
    if unsafe { libc::clock_gettime(id, &mut ts) } == 0 {
        Some(Timespec::new(ts.tv_sec as i64, ts.tv_nsec as i64))
    } else {
        None
    }
}

fn system_time() -> Timespec {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => Timespec::new(d.as_secs() as i64, i64::from(d.subsec_nanos())),
        Err(_) => Timespec::default(),
    }
}

impl RealtimeClock for PreciseClock {
    fn now(&self) -> Timespec {
        read(libc::CLOCK_REALTIME).unwrap_or_else(system_time)
    }

    fn name(&self) -> &'static str {
        "realtime"
    }
}

impl RealtimeClock for CoarseClock {
    fn now(&self) -> Timespec {
        COARSE_ID
            .and_then(read)
            .unwrap_or_else(|| PreciseClock.now())
    }

    fn name(&self) -> &'static str {
        "realtime-coarse"
    }
}

static COARSE_USABLE: Once<bool> = Once::new();

/// Whether the coarse clock can be read in this process. Probed once.
pub fn coarse_available() -> bool {
    *COARSE_USABLE.call_once(|| {
        let usable = COARSE_ID.and_then(read).is_some();
        debug!("coarse realtime clock usable: {}", usable);
        usable
    })
}

/// The clock a bounded wait configured with `source` should read.
pub fn clock_for(source: ClockSource) -> &'static (dyn RealtimeClock + Sync) {
    match source {
        ClockSource::Auto if coarse_available() => &CoarseClock,
        ClockSource::Auto | ClockSource::Precise => &PreciseClock,
        ClockSource::Coarse => &CoarseClock,
    }
}
