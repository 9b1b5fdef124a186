//! Advisory lock client.
//!
//! A named, leased mutual-exclusion record stored in the database, used
//! to serialize schema updates across processes. Acquisition polls at a
//! caller-supplied interval for a bounded number of attempts; the lease
//! expires on its own if the holder dies without releasing.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use vellum_adapter::{DatabaseAdapter, RepoResult, UniqueConstraint};

/// Acquisition and lease parameters for an advisory lock.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// How long a successful acquisition holds the lock without renewal.
    pub lease: Duration,
    /// Poll interval while another holder's lease is valid.
    pub acquire_interval: Duration,
    /// Acquisition attempts before giving up with `Conflict`.
    pub max_attempts: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            acquire_interval: Duration::from_millis(200),
            max_attempts: 50,
        }
    }
}

/// A held advisory lock. Release it explicitly; an unreleased lock is
/// taken over by the next acquirer once the lease expires.
pub struct AdvisoryLock<'a> {
    adapter: &'a dyn DatabaseAdapter,
    name: String,
    handle: i64,
    lease: Duration,
}

impl<'a> AdvisoryLock<'a> {
    /// Acquires the named lock, polling while it is held elsewhere.
    pub fn acquire(
        adapter: &'a dyn DatabaseAdapter,
        name: &str,
        options: LockOptions,
    ) -> RepoResult<Self> {
        let handle: i64 = rand::random();
        for attempt in 0..options.max_attempts {
            let acquired =
                adapter
                    .queries()?
                    .lock_acquire(name, handle, Utc::now(), options.lease)?;
            if acquired {
                debug!(name, attempt, "advisory lock acquired");
                return Ok(Self {
                    adapter,
                    name: name.to_owned(),
                    handle,
                    lease: options.lease,
                });
            }
            std::thread::sleep(options.acquire_interval);
        }
        Err(UniqueConstraint::AdvisoryLockName.into_error())
    }

    /// Extends the lease while the lock is held.
    pub fn renew(&self) -> RepoResult<()> {
        self.adapter
            .queries()?
            .lock_renew(&self.name, self.handle, Utc::now(), self.lease)
    }

    /// Releases the lock.
    pub fn release(self) -> RepoResult<()> {
        self.adapter.queries()?.lock_release(&self.name, self.handle)
    }
}

/// Runs `f` while holding the named advisory lock.
///
/// The lock is released whether `f` succeeds or fails; a release failure
/// is ignored in favor of `f`'s result since the lease would expire
/// anyway.
pub fn with_advisory_lock<T>(
    adapter: &dyn DatabaseAdapter,
    name: &str,
    options: LockOptions,
    f: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    let lock = AdvisoryLock::acquire(adapter, name, options)?;
    let result = f();
    if let Err(err) = lock.release() {
        debug!(name, %err, "advisory lock release failed, lease will expire");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_bounded() {
        let options = LockOptions::default();
        assert!(options.max_attempts > 0);
        assert!(options.acquire_interval < options.lease);
    }
}
