use std::fmt;

/// Requested or effective mode of a file lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Concurrent readers; coexists with other shared holders.
    Shared,
    /// Single writer; excludes every other holder.
    Exclusive,
    /// No locking. Present so callers can express the mode; the manager
    /// rejects it at acquisition.
    None,
}

impl LockMode {
    /// Lower-case label for log and error messages.
    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
            LockMode::None => "none",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}
