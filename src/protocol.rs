//! The two fixed-offset binary regions of a lock file.
//!
//! State region, bytes `[0, 2)`: protocol byte, then the clean flag.
//! Information region, bytes `[2..)`: protocol byte, then two
//! length-prefixed UTF-8 strings (owner process id, owner address). The
//! length prefix is a 2-byte big-endian unsigned count of bytes.
//!
//! Positional reads and writes keep the codec independent of any seek
//! cursor shared with the session. Trailing bytes beyond the second owner
//! string are never read.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::constants::{
    INFORMATION_REGION_DESCR_CHUNK_LIMIT, INFORMATION_REGION_POS, INFORMATION_REGION_PROTOCOL,
    STATE_REGION_POS, STATE_REGION_PROTOCOL,
};
use crate::types::errors::{LockError, Result};

/// Placeholder reported when the information region is absent or could not
/// be locked for reading.
pub(crate) const UNKNOWN_OWNER: &str = "unknown";

/// Owner details recorded in the information region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OwnerInfo {
    pub pid: String,
    pub address: String,
}

/// Write the state region: protocol byte plus clean flag.
pub(crate) fn write_state(file: &File, clean: bool) -> Result<()> {
    let buf = [STATE_REGION_PROTOCOL, u8::from(clean)];
    file.write_all_at(&buf, STATE_REGION_POS)?;
    Ok(())
}

/// Read the clean flag. A file too short to contain it means the previous
/// writer crashed mid-write, which reads as dirty.
pub(crate) fn read_clean_flag(file: &File) -> Result<bool> {
    let mut flag = [0u8; 1];
    let n = file.read_at(&mut flag, STATE_REGION_POS + 1)?;
    Ok(n == 1 && flag[0] != 0)
}

/// Verify the state-region protocol byte. An empty file has no prior
/// writer and passes.
pub(crate) fn check_state_protocol(file: &File, lock_file: &Path, display_name: &str) -> Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    let mut protocol = [0u8; 1];
    file.read_exact_at(&mut protocol, STATE_REGION_POS)?;
    if protocol[0] != STATE_REGION_PROTOCOL {
        return Err(corrupt(lock_file, display_name));
    }
    Ok(())
}

/// Record owner details, then truncate the file to the write offset so a
/// later reader can never see a previous owner's longer strings.
pub(crate) fn write_info(file: &File, pid: &str, address: &str) -> Result<()> {
    let mut buf = Vec::with_capacity(64);
    buf.push(INFORMATION_REGION_PROTOCOL);
    push_string(&mut buf, trim_if_necessary(pid));
    push_string(&mut buf, trim_if_necessary(address));
    file.write_all_at(&buf, INFORMATION_REGION_POS)?;
    file.set_len(INFORMATION_REGION_POS + buf.len() as u64)?;
    Ok(())
}

/// Read owner details back. `None` when the file is too short to carry an
/// information region at all.
pub(crate) fn read_info(
    file: &File,
    lock_file: &Path,
    display_name: &str,
) -> Result<Option<OwnerInfo>> {
    if file.metadata()?.len() <= INFORMATION_REGION_POS {
        return Ok(None);
    }
    let mut protocol = [0u8; 1];
    file.read_exact_at(&mut protocol, INFORMATION_REGION_POS)
        .map_err(|e| corrupt_or_io(e, lock_file, display_name))?;
    if protocol[0] != INFORMATION_REGION_PROTOCOL {
        return Err(corrupt(lock_file, display_name));
    }
    let mut pos = INFORMATION_REGION_POS + 1;
    let pid = read_string(file, &mut pos, lock_file, display_name)?;
    let address = read_string(file, &mut pos, lock_file, display_name)?;
    Ok(Some(OwnerInfo { pid, address }))
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn read_string(file: &File, pos: &mut u64, lock_file: &Path, display_name: &str) -> Result<String> {
    let mut len = [0u8; 2];
    file.read_exact_at(&mut len, *pos)
        .map_err(|e| corrupt_or_io(e, lock_file, display_name))?;
    *pos += 2;
    let len = usize::from(u16::from_be_bytes(len));
    let mut bytes = vec![0u8; len];
    file.read_exact_at(&mut bytes, *pos)
        .map_err(|e| corrupt_or_io(e, lock_file, display_name))?;
    *pos += len as u64;
    String::from_utf8(bytes).map_err(|_| corrupt(lock_file, display_name))
}

/// Truncate to the recordable limit on a character boundary.
fn trim_if_necessary(s: &str) -> &str {
    match s.char_indices().nth(INFORMATION_REGION_DESCR_CHUNK_LIMIT) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn corrupt(lock_file: &Path, display_name: &str) -> LockError {
    LockError::CorruptLockFile {
        lock_file: lock_file.to_path_buf(),
        display_name: display_name.to_string(),
    }
}

/// A truncated information region reads as corrupt; any other I/O failure
/// is wrapped as usual.
fn corrupt_or_io(err: io::Error, lock_file: &Path, display_name: &str) -> LockError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        corrupt(lock_file, display_name)
    } else {
        LockError::from(err)
    }
}
