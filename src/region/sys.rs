//! Thin wrapper over POSIX byte-range record locks.
//!
//! Open-file-description locks are used where available so that two
//! handles within one process contend the same way two processes do;
//! classic per-process `F_SETLK` is the fallback on other Unixes.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SETLK_CMD: libc::c_int = libc::F_OFD_SETLK;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SETLK_CMD: libc::c_int = libc::F_SETLK;

/// One non-blocking lock attempt on `[start, start + len)`.
///
/// `Ok(false)` means another holder has a conflicting lock on the range.
pub(crate) fn try_lock(file: &File, shared: bool, start: u64, len: u64) -> io::Result<bool> {
    let ty = if shared { libc::F_RDLCK } else { libc::F_WRLCK };
    match set_lock(file, ty as libc::c_short, start, len) {
        Ok(()) => Ok(true),
        Err(err) => match err.raw_os_error() {
            Some(code) if code == libc::EAGAIN || code == libc::EACCES => Ok(false),
            _ => Err(err),
        },
    }
}

/// Release any lock this handle holds on `[start, start + len)`.
pub(crate) fn unlock(file: &File, start: u64, len: u64) -> io::Result<()> {
    set_lock(file, libc::F_UNLCK as libc::c_short, start, len)
}

fn set_lock(file: &File, ty: libc::c_short, start: u64, len: u64) -> io::Result<()> {
    // l_pid must be zero for open-file-description locks; zeroed() covers it.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = ty;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = start as libc::off_t;
    fl.l_len = len as libc::off_t;
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), SETLK_CMD, &fl) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::path::Path;

    fn open_rw(path: &Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .unwrap()
    }

    #[test]
    fn exclusive_ranges_conflict_across_handles() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        assert!(try_lock(&a, false, 0, 2).unwrap());
        assert!(!try_lock(&b, false, 0, 2).unwrap());
        assert!(!try_lock(&b, true, 0, 2).unwrap());

        unlock(&a, 0, 2).unwrap();
        assert!(try_lock(&b, false, 0, 2).unwrap());
    }

    #[test]
    fn shared_ranges_coexist() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        assert!(try_lock(&a, true, 0, 2).unwrap());
        assert!(try_lock(&b, true, 0, 2).unwrap());
        assert!(!try_lock(&b, false, 0, 2).unwrap());
    }

    #[test]
    fn disjoint_ranges_do_not_conflict() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        assert!(try_lock(&a, false, 0, 2).unwrap());
        assert!(try_lock(&b, false, 2, 2046).unwrap());
    }

    #[test]
    fn closing_the_handle_releases_its_locks() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("t.lock");
        let a = open_rw(&path);
        let b = open_rw(&path);

        assert!(try_lock(&a, false, 0, 2).unwrap());
        drop(a);
        assert!(try_lock(&b, false, 0, 2).unwrap());
    }
}
