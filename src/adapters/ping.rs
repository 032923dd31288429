//! Best-effort owner signalling while waiting on a contended lock.

use std::path::Path;

use crate::types::errors::Result;

/// Transport used to ask a suspected lock owner to release soon.
///
/// Fire-and-forget: the session logs and ignores failures, and never calls
/// this while holding the information-region lock.
pub trait OwnerPinger: Send + Sync {
    fn ping_owner(&self, address: &str, target: &Path) -> Result<()>;
}

/// Pinger that does nothing. Deployments with a real transport inject
/// their own implementation via
/// [`FileLockManager::with_owner_pinger`](crate::FileLockManager::with_owner_pinger).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOwnerPinger;

impl OwnerPinger for NoopOwnerPinger {
    fn ping_owner(&self, _address: &str, _target: &Path) -> Result<()> {
        Ok(())
    }
}
