//! One acquired lock on a target file.
//!
//! A session owns the open lock-file handle and the state-region lock for
//! its whole lifetime. Exclusive sessions additionally record their owner
//! details in the information region during acquisition so that contended
//! waiters can diagnose or ping the holder. Writes to the guarded target
//! go through [`FileLock::write_file`] / [`FileLock::update_file`], which
//! bracket the user action with dirty/clean transitions of the state
//! region; a crash mid-action is therefore observable to the next
//! acquirer.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::adapters::{OwnerPinger, ProcessMetaDataProvider};
use crate::constants::{
    INFORMATION_REGION_POS, INFORMATION_REGION_SIZE, STATE_REGION_POS, STATE_REGION_SIZE,
};
use crate::paths;
use crate::protocol::{self, UNKNOWN_OWNER};
use crate::region::{self, RegionLock};
use crate::types::errors::{LockError, Result};
use crate::types::mode::LockMode;

/// A held lock. Guarded operations flow through it; [`FileLock::close`]
/// (or drop) releases the OS lock.
///
/// Not internally synchronised: callers serialise access to one session.
#[derive(Debug)]
pub struct FileLock {
    target: PathBuf,
    lock_file: PathBuf,
    /// Effective mode, derived from the region lock the OS granted.
    mode: LockMode,
    display_name: String,
    handle: Option<Arc<File>>,
    state_lock: Option<RegionLock>,
    integrity_violated: bool,
    contended: bool,
    busy: bool,
}

impl FileLock {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn acquire(
        target: PathBuf,
        requested_mode: LockMode,
        display_name: String,
        operation_display_name: &str,
        port: u16,
        timeout: Duration,
        metadata: &dyn ProcessMetaDataProvider,
        pinger: &dyn OwnerPinger,
    ) -> Result<Self> {
        if requested_mode == LockMode::None {
            return Err(LockError::UnsupportedMode(requested_mode));
        }

        let lock_file = paths::lock_file_for(&target);
        if let Some(parent) = lock_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let handle = Arc::new(
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&lock_file)?,
        );
        let deadline = Instant::now() + timeout;

        debug!(
            "waiting to acquire {} lock on {}",
            requested_mode.descriptor(),
            display_name
        );

        // The handle and every region lock below are RAII values: any `?`
        // past this point releases them in order before propagating.
        let state_lock = lock_state_region(
            &handle,
            requested_mode,
            deadline,
            &lock_file,
            &display_name,
            &target,
            pinger,
        )?;
        let Some(state_lock) = state_lock else {
            let owner_address = read_owner_address(&handle, deadline, &lock_file, &display_name)?;
            return Err(LockError::Timeout {
                display_name,
                owner_address,
                our_pid: metadata.process_identifier(),
                operation: operation_display_name.to_string(),
                lock_file,
            });
        };

        protocol::check_state_protocol(&handle, &lock_file, &display_name)?;

        if !state_lock.is_shared() {
            // Exclusive grant, whether or not it was asked for: bring the
            // state region into existence and publish owner details.
            if handle.metadata()?.len() < STATE_REGION_SIZE {
                // No prior writer; dirty until a clean cycle completes.
                protocol::write_state(&handle, false)?;
            }
            let info_lock = region::lock_region(
                &handle,
                LockMode::Exclusive,
                deadline,
                INFORMATION_REGION_POS,
                INFORMATION_REGION_SIZE - INFORMATION_REGION_POS,
                || Ok(()),
            )?
            .ok_or_else(|| {
                LockError::internal(format!(
                    "timeout waiting to lock the information region for {display_name}"
                ))
            })?;
            protocol::write_info(
                &handle,
                &metadata.process_identifier(),
                &port.to_string(),
            )?;
            drop(info_lock);
        }

        let clean = protocol::read_clean_flag(&handle)?;
        let mode = if state_lock.is_shared() {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };
        debug!("lock acquired on {display_name}");

        Ok(FileLock {
            target,
            lock_file,
            mode,
            display_name,
            handle: Some(handle),
            state_lock: Some(state_lock),
            integrity_violated: !clean,
            contended: false,
            busy: false,
        })
    }

    /// Effective mode of this session. May be broader than what was
    /// requested on platforms that promote shared grants.
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Whether `path` is this session's sidecar lock file.
    #[must_use]
    pub fn is_lock_file(&self, path: &Path) -> bool {
        path == self.lock_file
    }

    /// Read the on-disk clean flag: `true` iff the last exclusive holder
    /// completed a full write-cycle.
    pub fn unlocked_cleanly(&self) -> Result<bool> {
        let handle = self.assert_open()?;
        protocol::read_clean_flag(handle)
    }

    /// Run `producer` under the lock and return its value. Allowed in
    /// either mode, but refused while the target's integrity is in doubt.
    pub fn read_file<T, F>(&self, producer: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.assert_open_and_integral()?;
        producer()
    }

    /// Run a mutating `action` inside a write-cycle. Requires an exclusive
    /// session and a target that was unlocked cleanly.
    pub fn update_file<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.assert_open_and_integral()?;
        self.write_cycle(action)
    }

    /// Recovery entry point: run a write-cycle even when the target was
    /// not unlocked cleanly. A normally-returning action clears the
    /// violation for this session and on disk.
    pub fn write_file<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.assert_open()?;
        self.write_cycle(action)
    }

    /// Record that another process asked for this lock.
    pub fn set_contended(&mut self, contended: bool) {
        self.contended = contended;
    }

    #[must_use]
    pub fn is_contended(&self) -> bool {
        self.contended
    }

    /// Record that the holder is mid-operation and cannot release yet.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Release the lock. Idempotent; I/O failures are logged and
    /// swallowed so release never fails.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        debug!("releasing lock on {}", self.display_name);
        if self.mode == LockMode::Exclusive {
            // Discard owner details while the state region is still held.
            if let Err(err) = handle.set_len(INFORMATION_REGION_POS) {
                warn!("error releasing lock on {}: {err}", self.display_name);
            }
        }
        // Unlock the state region, then let the last handle close the fd.
        self.state_lock.take();
        drop(handle);
    }

    fn write_cycle<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.mode != LockMode::Exclusive {
            return Err(LockError::InsufficientLockMode);
        }
        let handle = Arc::clone(self.assert_open()?);
        self.integrity_violated = true;
        protocol::write_state(&handle, false)?;
        action()?;
        protocol::write_state(&handle, true)?;
        self.integrity_violated = false;
        Ok(())
    }

    fn assert_open(&self) -> Result<&Arc<File>> {
        self.handle.as_ref().ok_or(LockError::Closed)
    }

    fn assert_open_and_integral(&self) -> Result<()> {
        self.assert_open()?;
        if self.integrity_violated {
            return Err(LockError::IntegrityViolation {
                target: self.target.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.close();
    }
}

/// State-region wait loop: between attempts, discover the current owner
/// and ping it so it can release sooner.
fn lock_state_region(
    handle: &Arc<File>,
    mode: LockMode,
    deadline: Instant,
    lock_file: &Path,
    display_name: &str,
    target: &Path,
    pinger: &dyn OwnerPinger,
) -> Result<Option<RegionLock>> {
    region::lock_region(
        handle,
        mode,
        deadline,
        STATE_REGION_POS,
        STATE_REGION_SIZE,
        || {
            let owner_address = read_owner_address(handle, deadline, lock_file, display_name)?;
            info!("will attempt to ping owner at {owner_address}");
            if owner_address != UNKNOWN_OWNER {
                if let Err(err) = pinger.ping_owner(&owner_address, target) {
                    debug!("could not ping lock owner at {owner_address}: {err}");
                }
            }
            Ok(())
        },
    )
}

/// Fetch the owner address for diagnostics under a short shared
/// information-region lock. Failing to take the lock, or a missing
/// region, degrades to "unknown"; a corrupt region is still an error.
fn read_owner_address(
    handle: &Arc<File>,
    deadline: Instant,
    lock_file: &Path,
    display_name: &str,
) -> Result<String> {
    let Some(info_lock) = region::lock_region(
        handle,
        LockMode::Shared,
        deadline,
        INFORMATION_REGION_POS,
        INFORMATION_REGION_SIZE - INFORMATION_REGION_POS,
        || Ok(()),
    )?
    else {
        debug!("could not lock information region for {display_name}; ignoring");
        return Ok(UNKNOWN_OWNER.to_string());
    };
    let owner = protocol::read_info(handle, lock_file, display_name)?;
    drop(info_lock);
    Ok(match owner {
        Some(info) => info.address,
        None => {
            debug!("lock file for {display_name} is too short to contain an information region; ignoring");
            UNKNOWN_OWNER.to_string()
        }
    })
}
