//! Entry point: canonicalises targets and constructs lock sessions.

use std::path::Path;
use std::time::Duration;

use crate::adapters::{
    CurrentProcessMetaDataProvider, NoopOwnerPinger, OwnerPinger, ProcessMetaDataProvider,
};
use crate::constants::DEFAULT_LOCK_TIMEOUT_MS;
use crate::paths;
use crate::session::FileLock;
use crate::types::errors::{LockError, Result};
use crate::types::mode::LockMode;

/// Stateless facade over lock acquisition. One manager is typically
/// shared per process; every acquired lock is an independent
/// [`FileLock`] session.
pub struct FileLockManager {
    metadata: Box<dyn ProcessMetaDataProvider>,
    pinger: Box<dyn OwnerPinger>,
    lock_timeout_ms: u64,
}

impl FileLockManager {
    #[must_use]
    pub fn new(metadata: Box<dyn ProcessMetaDataProvider>) -> Self {
        Self {
            metadata,
            pinger: Box::new(NoopOwnerPinger),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_owner_pinger(mut self, pinger: Box<dyn OwnerPinger>) -> Self {
        self.pinger = pinger;
        self
    }

    /// Acquire a lock on `target` with an empty operation display name.
    pub fn lock(
        &self,
        target: &Path,
        mode: LockMode,
        display_name: &str,
        port: u16,
    ) -> Result<FileLock> {
        self.lock_for_operation(target, mode, display_name, "", port)
    }

    /// Acquire a lock on `target`, naming the operation for the benefit of
    /// whoever reads a timeout error.
    pub fn lock_for_operation(
        &self,
        target: &Path,
        mode: LockMode,
        display_name: &str,
        operation_display_name: &str,
        port: u16,
    ) -> Result<FileLock> {
        if mode == LockMode::None {
            return Err(LockError::UnsupportedMode(mode));
        }
        let canonical = paths::canonicalise(target);
        FileLock::acquire(
            canonical,
            mode,
            display_name.to_string(),
            operation_display_name,
            port,
            Duration::from_millis(self.lock_timeout_ms),
            self.metadata.as_ref(),
            self.pinger.as_ref(),
        )
    }
}

impl Default for FileLockManager {
    fn default() -> Self {
        Self::new(Box::new(CurrentProcessMetaDataProvider))
    }
}
