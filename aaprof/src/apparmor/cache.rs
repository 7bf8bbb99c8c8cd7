//! Change-gated profile writes.
//!
//! `apparmor_parser` decides whether its binary cache is stale by comparing mtimes, so a
//! profile file must only be rewritten when its content actually changes.

use std::fs::{DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

use tracing::debug;

use super::error::ProfileError;

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Current content of `path`, empty if the file does not exist.
pub fn read_current(path: &Path) -> Result<String, ProfileError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ProfileError::io(path, e)),
    }
}

/// Create `dir` and its parents owner-only. An existing directory is fine.
pub fn ensure_private_dir(dir: &Path) -> Result<(), ProfileError> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
        .map_err(|e| ProfileError::io(dir, e))
}

/// Write `content` to `path` unless it already holds exactly that content.
///
/// `dirs` are created first, and only when a write is needed. Returns whether the file was
/// written.
pub fn write_if_changed(path: &Path, content: &str, dirs: &[&Path]) -> Result<bool, ProfileError> {
    let current = read_current(path)?;
    if current == content {
        debug!("Profile {} is up to date", path.display());
        return Ok(false);
    }

    for dir in dirs {
        ensure_private_dir(dir)?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)
        .map_err(|e| ProfileError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ProfileError::io(path, e))?;

    debug!("Wrote profile {}", path.display());
    Ok(true)
}
