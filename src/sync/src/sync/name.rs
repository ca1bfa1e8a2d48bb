//! Throwaway names for named semaphores.
//!
//! A name only has to exist between `sem_open` and `sem_unlink`, but during
//! that window it is visible system-wide, so it must be unpredictable and is
//! always opened with `O_EXCL`.

use std::ffi::CString;

use rand::distributions::Alphanumeric;
use rand::Rng;

use procsync_common::{Result, SyncError};

/// Random characters appended to every name.
const SUFFIX_LEN: usize = 16;

/// Longest prefix kept, leaving room for the pid and suffix within NAME_MAX.
const MAX_PREFIX_LEN: usize = 64;

/// Strip characters a POSIX semaphore name cannot contain past its leading
/// slash.
fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .filter(|c| *c != '/' && *c != '\0')
        .take(MAX_PREFIX_LEN)
        .collect()
}

/// `/<prefix>.<pid>.<random>`, ready for `sem_open`.
pub fn generate(prefix: &str) -> Result<CString> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    let name = format!("/{}.{}.{}", sanitize(prefix), std::process::id(), suffix);
    CString::new(name).map_err(|_| SyncError::InvalidArgument("semaphore name contains NUL"))
}
