use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::version::DottedVersion;
use crate::config::Config;

/// Bit of `CAP_MAC_ADMIN` in the capability sets of `/proc/<pid>/status`.
const CAP_MAC_ADMIN: u32 = 33;

/// `uid_map` content of a process in the initial user namespace.
const INIT_UID_MAP: [&str; 3] = ["0", "0", "4294967295"];

/// What the host lets this process do with AppArmor. Computed once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HostCapabilities {
    /// AppArmor is enabled in the kernel and the parser is installed.
    pub available: bool,
    /// Per-instance profiles may be loaded and unloaded.
    pub admin: bool,
    /// The kernel supports policy namespace stacking.
    pub stacking: bool,
    /// This process already runs inside a stacked namespace.
    pub stacked: bool,
    /// This process runs inside a non-initial user namespace.
    pub user_namespace: bool,
    /// The kernel exposes cgroup namespaces.
    pub cgroup_namespace: bool,
}

impl HostCapabilities {
    /// No AppArmor support at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Stacking is usable for new instance namespaces.
    pub fn can_stack(&self) -> bool {
        self.stacking && !self.stacked
    }

    /// Probe securityfs and `/proc/self` as described by `config`.
    pub fn detect(config: &Config) -> Self {
        let user_namespace = running_in_user_namespace(&config.proc_self_dir);
        let cgroup_namespace = config.proc_self_dir.join("ns").join("cgroup").exists();

        if !config.enabled {
            warn!("AppArmor support has been manually disabled");
            return Self {
                user_namespace,
                cgroup_namespace,
                ..Self::disabled()
            };
        }

        let available = check_available(config);
        let stacking = can_stack(&config.security_dir);
        let stacked = read_flag(&config.security_dir.join(".ns_stacked"));

        let admin = if !has_mac_admin(&config.proc_self_dir) {
            if available {
                warn!(
                    "Per-instance AppArmor profiles are disabled because the mac_admin capability is missing"
                );
            }
            false
        } else if user_namespace && !stacked {
            if available {
                warn!(
                    "Per-instance AppArmor profiles are disabled because we are running in an unprivileged container without stacking"
                );
            }
            false
        } else {
            available
        };

        let caps = Self {
            available,
            admin,
            stacking,
            stacked,
            user_namespace,
            cgroup_namespace,
        };
        debug!("Detected AppArmor host capabilities: {:?}", caps);
        caps
    }
}

fn check_available(config: &Config) -> bool {
    if !config.security_dir.is_dir() {
        warn!("AppArmor support has been disabled because of lack of kernel support");
        return false;
    }

    if !find_program(&config.parser) {
        warn!(
            "AppArmor support has been disabled because '{}' couldn't be found",
            config.parser
        );
        return false;
    }

    true
}

/// Resolve `program` the way `execvp` would: paths are checked directly, bare names are
/// searched for on `PATH`.
fn find_program(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

fn read_flag(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.trim() == "yes")
        .unwrap_or(false)
}

/// Stacking needs the `stack` domain feature and domain version 1.2 or newer.
fn can_stack(security_dir: &Path) -> bool {
    let domain = security_dir.join("features").join("domain");
    if !read_flag(&domain.join("stack")) {
        return false;
    }

    let Ok(content) = std::fs::read_to_string(domain.join("version")) else {
        return false;
    };

    match content.trim().parse::<DottedVersion>() {
        Ok(version) => version >= DottedVersion::new(vec![1, 2]),
        Err(e) => {
            warn!("Unknown AppArmor domain version {:?}: {}", content.trim(), e);
            false
        }
    }
}

fn running_in_user_namespace(proc_self: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(proc_self.join("uid_map")) else {
        return false;
    };

    let fields: Vec<&str> = content.split_whitespace().collect();
    fields != INIT_UID_MAP
}

fn has_mac_admin(proc_self: &Path) -> bool {
    let Ok(status) = std::fs::read_to_string(proc_self.join("status")) else {
        return false;
    };

    status
        .lines()
        .find_map(|line| line.strip_prefix("CapEff:"))
        .and_then(|hex| u64::from_str_radix(hex.trim(), 16).ok())
        .is_some_and(|caps| caps & (1 << CAP_MAC_ADMIN) != 0)
}
