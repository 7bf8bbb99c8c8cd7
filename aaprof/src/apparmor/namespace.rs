//! Kernel policy namespaces for stacked confinement.
//!
//! With stacking, each instance gets `<security_dir>/policy/namespaces/<namespace>` so that
//! nested runtimes can load their own profiles under it. Nothing is done when the kernel
//! cannot stack or when this process is itself already stacked.

use std::fs::DirBuilder;
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use tracing::{debug, error};

use super::error::ProfileError;
use super::host::HostCapabilities;
use crate::config::Config;

const NAMESPACE_MODE: u32 = 0o755;

pub fn namespace_path(config: &Config, namespace: &str) -> PathBuf {
    config.namespaces_dir().join(namespace)
}

/// Create the namespace directory. An existing namespace is not an error.
pub fn ensure_namespace(
    config: &Config,
    caps: &HostCapabilities,
    namespace: &str,
) -> Result<(), ProfileError> {
    if !caps.can_stack() {
        return Ok(());
    }

    let path = namespace_path(config, namespace);
    match DirBuilder::new().mode(NAMESPACE_MODE).create(&path) {
        Ok(()) => {
            debug!("Created AppArmor namespace {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(ProfileError::io(path, e)),
    }
}

/// Remove the namespace directory. Failures are logged and otherwise ignored.
pub fn teardown_namespace(config: &Config, caps: &HostCapabilities, namespace: &str) {
    if !caps.can_stack() {
        return;
    }

    let path = namespace_path(config, namespace);
    if let Err(e) = std::fs::remove_dir(&path) {
        error!(err = %e, ns = %path.display(), "Error removing apparmor namespace");
    }
}
