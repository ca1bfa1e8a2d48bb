//! Types shared across the procsync crates.
//!
//! - [`error`]: the error taxonomy every primitive reports through
//! - [`config`]: construction options for semaphores and condition variables
//! - [`status`]: the boolean-or-error shape a host binding hands back to callers

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod status;

pub use config::{ClockSource, CondvarConfig, Permissions, SemaphoreConfig};
pub use error::{ErrorKind, Result, SyncError};
pub use status::CallStatus;
