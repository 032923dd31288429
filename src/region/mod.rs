//! Bounded-wait acquisition of byte-range locks with a per-attempt hook.

mod sys;

use std::fs::File;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::constants::LOCK_RETRY_MS;
use crate::types::errors::Result;
use crate::types::mode::LockMode;

/// An acquired byte-range lock. Dropping it releases the range; the handle
/// it was taken on stays alive for as long as the lock exists.
#[derive(Debug)]
pub(crate) struct RegionLock {
    file: Arc<File>,
    start: u64,
    len: u64,
    shared: bool,
}

impl RegionLock {
    /// Whether the OS granted this lock in shared mode. The session derives
    /// its effective mode from this, not from what was requested.
    pub(crate) fn is_shared(&self) -> bool {
        self.shared
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        if let Err(err) = sys::unlock(&self.file, self.start, self.len) {
            warn!(
                "failed to release lock on bytes [{}, {}): {err}",
                self.start,
                self.start + self.len
            );
        }
    }
}

/// Poll for a lock on `[start, start + len)` until `deadline`.
///
/// Between attempts, `on_retry` runs (owner discovery for the state region,
/// a no-op for the information region) followed by a fixed 200 ms sleep.
/// Contention never becomes an error here: deadline expiry yields
/// `Ok(None)`. Even a deadline already in the past gets one attempt.
pub(crate) fn lock_region<F>(
    file: &Arc<File>,
    mode: LockMode,
    deadline: Instant,
    start: u64,
    len: u64,
    mut on_retry: F,
) -> Result<Option<RegionLock>>
where
    F: FnMut() -> Result<()>,
{
    let shared = mode == LockMode::Shared;
    loop {
        if sys::try_lock(file, shared, start, len)? {
            return Ok(Some(RegionLock {
                file: Arc::clone(file),
                start,
                len,
                shared,
            }));
        }
        on_retry()?;
        thread::sleep(Duration::from_millis(LOCK_RETRY_MS));
        if Instant::now() >= deadline {
            trace!(
                "gave up waiting for bytes [{}, {}) at deadline",
                start,
                start + len
            );
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::errors::LockError;
    use std::fs::OpenOptions;
    use std::path::Path;

    fn open_rw(path: &Path) -> Arc<File> {
        Arc::new(
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .unwrap(),
        )
    }

    fn no_retry() -> impl FnMut() -> Result<()> {
        || Ok(())
    }

    #[test]
    fn uncontended_range_is_granted_even_past_the_deadline() {
        let td = tempfile::tempdir().unwrap();
        let file = open_rw(&td.path().join("t.lock"));
        let lock = lock_region(&file, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
            .unwrap()
            .unwrap();
        assert!(!lock.is_shared());
    }

    #[test]
    fn dropping_the_lock_frees_the_range() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        let held = lock_region(&a, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
            .unwrap()
            .unwrap();
        assert!(
            lock_region(&b, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
                .unwrap()
                .is_none()
        );
        drop(held);
        assert!(
            lock_region(&b, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn retry_hook_runs_between_attempts() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        let _held = lock_region(&a, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
            .unwrap()
            .unwrap();

        let mut attempts = 0u32;
        let deadline = Instant::now() + Duration::from_millis(450);
        let result = lock_region(&b, LockMode::Exclusive, deadline, 0, 2, || {
            attempts += 1;
            Ok(())
        })
        .unwrap();
        assert!(result.is_none());
        assert!(attempts >= 2, "hook ran {attempts} times");
    }

    #[test]
    fn hook_error_aborts_the_wait() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        let _held = lock_region(&a, LockMode::Exclusive, Instant::now(), 0, 2, no_retry())
            .unwrap()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let err = lock_region(&b, LockMode::Exclusive, deadline, 0, 2, || {
            Err(LockError::internal("owner record unreadable"))
        })
        .unwrap_err();
        assert!(matches!(err, LockError::Internal { .. }));
    }

    #[test]
    fn shared_lock_reports_shared() {
        let td = tempfile::tempdir().unwrap();
        let file = open_rw(&td.path().join("t.lock"));
        let lock = lock_region(&file, LockMode::Shared, Instant::now(), 0, 2, no_retry())
            .unwrap()
            .unwrap();
        assert!(lock.is_shared());
    }
}
