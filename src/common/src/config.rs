//! Construction options for the primitives.

use bitflags::bitflags;

bitflags! {
    /// Permission bits applied when a named semaphore is created.
    ///
    /// The name is unlinked right after creation, so these bits only matter
    /// during the short window in which the name exists.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Permissions: u32 {
        /// `S_IRUSR`
        const OWNER_READ  = 0o400;
        /// `S_IWUSR`
        const OWNER_WRITE = 0o200;
        /// `S_IRGRP`
        const GROUP_READ  = 0o040;
        /// `S_IWGRP`
        const GROUP_WRITE = 0o020;
        /// `S_IROTH`
        const OTHER_READ  = 0o004;
        /// `S_IWOTH`
        const OTHER_WRITE = 0o002;
    }
}

impl Permissions {
    /// Owner read/write, the mode a private temporary object is created with.
    pub const OWNER_RW: Self = Self::OWNER_READ.union(Self::OWNER_WRITE);

    /// The bits as a `mode_t` suitable for `sem_open`.
    pub fn mode(self) -> libc::mode_t {
        self.bits() as libc::mode_t
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::OWNER_RW
    }
}

/// Options for creating a semaphore.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SemaphoreConfig {
    /// Initial count.
    pub initial: u32,
    /// Mode used while the name briefly exists.
    pub permissions: Permissions,
    /// Leading component of the generated name.
    pub name_prefix: String,
    /// How many random names to try before giving up on `EEXIST`.
    pub name_attempts: u32,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            initial: 0,
            permissions: Permissions::default(),
            name_prefix: String::from("procsync"),
            name_attempts: 16,
        }
    }
}

impl SemaphoreConfig {
    /// Default options with the given initial count.
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    /// Set the creation mode.
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the name prefix. Slashes are not allowed in semaphore names and
    /// are stripped when the name is generated.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Set the number of names tried before giving up.
    pub fn name_attempts(mut self, attempts: u32) -> Self {
        self.name_attempts = attempts.max(1);
        self
    }
}

/// Which real-time clock a bounded wait reads to build its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockSource {
    /// Coarse clock when the platform supports it, otherwise precise.
    #[default]
    Auto,
    /// `CLOCK_REALTIME_COARSE`. Falls back to precise where unavailable.
    Coarse,
    /// `CLOCK_REALTIME`.
    Precise,
}

/// Options for creating a condition variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CondvarConfig {
    /// Clock used by `timedwait`.
    pub clock: ClockSource,
}

impl CondvarConfig {
    /// Set the deadline clock.
    pub fn clock(mut self, clock: ClockSource) -> Self {
        self.clock = clock;
        self
    }
}
