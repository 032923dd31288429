//! Lock-file placement and target canonicalisation.

use std::path::{Path, PathBuf};

/// Compute the sidecar lock-file path for a target.
///
/// A directory target keeps its lock file inside itself
/// (`D/<basename(D)>.lock`); anything else gets a sibling
/// (`parent/<basename>.lock`).
#[must_use]
pub fn lock_file_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lock");
    if target.is_dir() {
        target.join(name)
    } else {
        match target.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Best-effort canonicalisation that tolerates targets which do not exist
/// yet: the parent is canonicalised instead and the final component
/// re-appended. Falls back to the path unchanged when nothing resolves.
#[must_use]
pub fn canonicalise(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(resolved) = parent.canonicalize() {
            return resolved.join(name);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_sits_beside_a_regular_file() {
        assert_eq!(
            lock_file_for(Path::new("/var/cache/artifacts.bin")),
            Path::new("/var/cache/artifacts.bin.lock")
        );
    }

    #[test]
    fn lock_file_sits_inside_a_directory_target() {
        let td = tempfile::tempdir().unwrap();
        let dir = td.path().join("store");
        std::fs::create_dir(&dir).unwrap();
        assert_eq!(lock_file_for(&dir), dir.join("store.lock"));
    }

    #[test]
    fn missing_target_uses_the_sibling_rule() {
        let td = tempfile::tempdir().unwrap();
        let target = td.path().join("not-yet-written.bin");
        assert_eq!(lock_file_for(&target), td.path().join("not-yet-written.bin.lock"));
    }

    #[test]
    fn canonicalise_resolves_existing_paths() {
        let td = tempfile::tempdir().unwrap();
        let file = td.path().join("data");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(canonicalise(&file), file.canonicalize().unwrap());
    }

    #[test]
    fn canonicalise_tolerates_a_missing_final_component() {
        let td = tempfile::tempdir().unwrap();
        let missing = td.path().join("missing.bin");
        let expected = td.path().canonicalize().unwrap().join("missing.bin");
        assert_eq!(canonicalise(&missing), expected);
    }

    #[test]
    fn canonicalise_falls_back_to_the_input() {
        let path = Path::new("/definitely/not/here/at/all.bin");
        assert_eq!(canonicalise(path), path);
    }
}
