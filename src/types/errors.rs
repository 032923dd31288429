//! Error types used across lockyard.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::mode::LockMode;

/// Convenient alias for results returning a [`LockError`].
pub type Result<T> = std::result::Result<T, LockError>;

/// Every failure a lock operation can surface.
///
/// Contention itself is never an error. The region primitive converts it
/// into a retry or a timeout, so the only contention-shaped variant here
/// is [`LockError::Timeout`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The state region could not be acquired before the deadline.
    #[error(
        "timeout waiting to lock {display_name}. It is currently in use by another process.\n\
         Owner address: {owner_address}\n\
         Our PID: {our_pid}\n\
         Our operation: {operation}\n\
         Lock file: {}",
        .lock_file.display()
    )]
    Timeout {
        display_name: String,
        owner_address: String,
        our_pid: String,
        operation: String,
        lock_file: PathBuf,
    },

    /// A region protocol byte did not match the expected constant.
    #[error("unexpected lock protocol found in lock file '{}' for {display_name}", .lock_file.display())]
    CorruptLockFile {
        lock_file: PathBuf,
        display_name: String,
    },

    /// The previous writer did not finish its write-cycle cleanly. The
    /// session stays usable; `write_file` is the recovery entry point.
    #[error("the file '{}' was not unlocked cleanly", .target.display())]
    IntegrityViolation { target: PathBuf },

    /// A write operation was attempted while holding a shared lock.
    #[error("an exclusive lock is required for this operation")]
    InsufficientLockMode,

    /// A guarded operation was attempted after `close()`.
    #[error("this lock has been closed")]
    Closed,

    /// The requested mode has no lock implementation.
    #[error("locking mode {} is not supported", .0.descriptor())]
    UnsupportedMode(LockMode),

    /// The OS interrupted a lock syscall while waiting.
    #[error("interrupted while waiting for a file lock")]
    Interrupted,

    /// Unchecked OS or I/O failure, wrapped with its cause.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl LockError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        LockError::Internal {
            message: message.into(),
            source: None,
        }
    }
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Interrupted {
            return LockError::Interrupted;
        }
        LockError::Internal {
            message: "i/o failure on lock file".to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn timeout_message_names_owner_and_lock_file() {
        let err = LockError::Timeout {
            display_name: "artifact cache".to_string(),
            owner_address: "41735".to_string(),
            our_pid: "999".to_string(),
            operation: "resolve dependencies".to_string(),
            lock_file: Path::new("/var/cache/artifact.lock").to_path_buf(),
        };
        let msg = err.to_string();
        assert!(msg.contains("artifact cache"), "got: {msg}");
        assert!(msg.contains("41735"), "got: {msg}");
        assert!(msg.contains("/var/cache/artifact.lock"), "got: {msg}");
    }

    #[test]
    fn interrupted_io_maps_to_interrupted() {
        let io = io::Error::new(io::ErrorKind::Interrupted, "EINTR");
        assert!(matches!(LockError::from(io), LockError::Interrupted));
    }

    #[test]
    fn other_io_is_wrapped_with_cause() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "EACCES");
        let err = LockError::from(io);
        match err {
            LockError::Internal { source, .. } => assert!(source.is_some()),
            other => panic!("expected Internal, got {other}"),
        }
    }
}
