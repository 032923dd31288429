//! Shared crate-wide constants for the lock-file protocol.
//!
//! The on-disk layout is fixed: changing any of the region constants is a
//! wire-format break for every process observing the same lock files.

/// Protocol version byte at the start of the state region.
pub const STATE_REGION_PROTOCOL: u8 = 1;

/// Offset of the state region within the lock file.
pub const STATE_REGION_POS: u64 = 0;

/// Size of the state region: one protocol byte plus one clean-flag byte.
pub const STATE_REGION_SIZE: u64 = 2;

/// Protocol version byte at the start of the information region.
pub const INFORMATION_REGION_PROTOCOL: u8 = 2;

/// Offset of the information region. Exclusive holders truncate the lock
/// file back to this position on close, discarding their owner details.
pub const INFORMATION_REGION_POS: u64 = STATE_REGION_POS + STATE_REGION_SIZE;

/// Upper bound of the byte range covered by information-region locks.
pub const INFORMATION_REGION_SIZE: u64 = 2048;

/// Owner strings longer than this many characters are truncated by the
/// writer before being recorded in the information region.
pub const INFORMATION_REGION_DESCR_CHUNK_LIMIT: usize = 340;

/// Sleep between try-lock attempts while waiting on a contended region.
pub const LOCK_RETRY_MS: u64 = 200;

/// Default acquisition timeout used by `FileLockManager::new()` unless
/// overridden by `with_lock_timeout_ms()`.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 60_000;
