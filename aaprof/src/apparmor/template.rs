//! Generation of the per-instance AppArmor profile text.
//!
//! The output is a pure function of [`ProfileContext`]: identical contexts always render
//! byte-identical profiles, which is what lets the change gate skip rewrites.

use std::collections::HashMap;
use std::fmt::Write;

use super::error::ProfileError;
use super::host::HostCapabilities;
use super::identity::ProfileIdentity;
use crate::instance::{Instance, RAW_APPARMOR_KEY};

/// Everything the template needs to know about the host and the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContext {
    pub feature_unix: bool,
    pub feature_cgns: bool,
    pub feature_stacking: bool,
    pub namespace: String,
    pub nesting: bool,
    pub name: String,
    pub unprivileged: bool,
    pub raw: String,
    pub var_dir: String,
}

impl ProfileContext {
    pub fn new(
        caps: &HostCapabilities,
        instance: &dyn Instance,
        identity: &ProfileIdentity,
        feature_unix: bool,
        var_dir: &std::path::Path,
    ) -> Self {
        Self {
            feature_unix,
            feature_cgns: caps.cgroup_namespace,
            feature_stacking: caps.can_stack(),
            namespace: identity.namespace.clone(),
            nesting: instance.is_nesting(),
            name: identity.full_name.clone(),
            // Inside a user namespace even "privileged" instances are unprivileged on the host.
            unprivileged: !instance.is_privileged() || caps.user_namespace,
            raw: raw_apparmor_block(instance.expanded_config()),
            var_dir: var_dir.to_string_lossy().trim_end_matches('/').to_string(),
        }
    }
}

/// The user's `raw.apparmor` rules, indented to sit inside the profile body.
///
/// Only this key is read from the instance configuration.
pub fn raw_apparmor_block(config: &HashMap<String, String>) -> String {
    let Some(raw) = config.get(RAW_APPARMOR_KEY) else {
        return String::new();
    };

    let raw = raw.trim_matches('\n');
    if raw.trim().is_empty() {
        return String::new();
    }

    raw.split('\n')
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_profile(ctx: &ProfileContext) -> Result<String, ProfileError> {
    let mut out = String::new();

    writeln!(out, "#include <tunables/global>")?;
    writeln!(
        out,
        "profile \"{}\" flags=(attach_disconnected,mediate_deleted) {{",
        ctx.name
    )?;
    write_base(&mut out)?;

    if ctx.feature_unix {
        write_unix(&mut out)?;
    }

    if ctx.feature_cgns {
        write_cgroup_namespace(&mut out)?;
    }

    if ctx.nesting {
        write_nesting(&mut out, ctx)?;
    } else {
        write_policy_loading(&mut out, ctx)?;
    }

    if ctx.unprivileged {
        write_unprivileged(&mut out)?;
    }

    if !ctx.raw.is_empty() {
        writeln!(out)?;
        writeln!(out, "  ### Configuration: raw.apparmor")?;
        writeln!(out, "{}", ctx.raw)?;
    }

    writeln!(out, "}}")?;
    Ok(out)
}

fn write_base(out: &mut String) -> std::fmt::Result {
    out.push_str(
        r#"  ### Base
  # Allow unrestricted access to most things
  capability,
  file,
  network,
  umount,

  # Hide common denials
  deny mount options=(ro, remount) -> /,
  deny mount options=(ro, remount, silent) -> /,

  # Allow the mounts every init system performs
  mount fstype=devpts,
  mount fstype=mqueue,
  mount fstype=proc,
  mount fstype=sysfs,
  mount fstype=tmpfs,
  mount options=(rw,bind),
  mount options=(rw,make-slave) -> **,
  mount options=(rw,make-rslave) -> **,
  mount options=(rw,make-shared) -> **,
  mount options=(rw,make-rshared) -> **,
  mount options=(rw,make-private) -> **,
  mount options=(rw,make-rprivate) -> **,

  # Block dangerous kernel interfaces
  deny /proc/sysrq-trigger rwklx,
  deny /proc/kcore rwklx,
  deny /proc/sys/kernel/modprobe wklx,
  deny /sys/firmware/efi/efivars/** rwklx,
  deny /sys/fs/cgroup/*/release_agent rwklx,
  deny mount fstype=debugfs -> /**,
"#,
    );
    Ok(())
}

fn write_unix(out: &mut String) -> std::fmt::Result {
    out.push_str(
        r#"
  ### Feature: unix
  # Allow receive via unix sockets from anywhere
  unix (receive),
  # Allow all unix within the instance
  unix peer=(label=@{profile_name}),
  # Allow receiving signals from anywhere
  signal (receive),
  # Allow sending signals to ourselves
  signal peer=@{profile_name},
  # Allow other processes to read our /proc entries
  ptrace (readby),
  # Allow other processes to trace us
  ptrace (tracedby),
  # Allow us to ptrace ourselves
  ptrace peer=@{profile_name},
"#,
    );
    Ok(())
}

fn write_cgroup_namespace(out: &mut String) -> std::fmt::Result {
    out.push_str(
        r#"
  ### Feature: cgroup namespace
  mount fstype=cgroup -> /sys/fs/cgroup/**,
  mount fstype=cgroup2 -> /sys/fs/cgroup/**,
"#,
    );
    Ok(())
}

fn write_nesting(out: &mut String, ctx: &ProfileContext) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "  ### Feature: nesting")?;
    writeln!(out, "  pivot_root,")?;
    if ctx.feature_unix {
        writeln!(out, "  ptrace,")?;
        writeln!(out, "  signal,")?;
    }
    writeln!(out, "  deny /dev/.lxd/proc/** rw,")?;
    writeln!(out, "  deny /dev/.lxd/sys/** rw,")?;
    writeln!(
        out,
        "  mount {dir}/shmounts/ -> {dir}/shmounts/,",
        dir = ctx.var_dir
    )?;
    writeln!(out, "  mount none -> {}/shmounts/,", ctx.var_dir)?;
    writeln!(out, "  mount fstype=proc -> /usr/lib/*/lxc/**,")?;
    writeln!(out, "  mount fstype=sysfs -> /usr/lib/*/lxc/**,")?;
    writeln!(out, "  mount options=(rw,rbind),")?;

    if ctx.feature_stacking {
        writeln!(out, "  change_profile -> \":{}:*\",", ctx.namespace)?;
        writeln!(out, "  change_profile -> \":{}://*\",", ctx.namespace)?;
    } else {
        writeln!(out, "  change_profile -> \"*\",")?;
    }
    Ok(())
}

fn write_policy_loading(out: &mut String, ctx: &ProfileContext) -> std::fmt::Result {
    writeln!(out)?;
    if ctx.feature_stacking {
        writeln!(out, "  ### Configuration: AppArmor loading (in namespace)")?;
        writeln!(out, "  deny /sys/kernel/security/[^a]*{{,/**}} wklx,")?;
        writeln!(out, "  deny /sys/kernel/security/a[^p]*{{,/**}} wklx,")?;
        writeln!(out, "  change_profile -> \":{}://*\",", ctx.namespace)?;
    } else {
        writeln!(out, "  ### Configuration: AppArmor loading disabled")?;
        writeln!(out, "  deny /sys/kernel/security/** wklx,")?;
        writeln!(out, "  deny /sys/kernel/security/apparmor/.replace rwklx,")?;
        writeln!(out, "  deny /sys/kernel/security/apparmor/.remove rwklx,")?;
    }
    Ok(())
}

fn write_unprivileged(out: &mut String) -> std::fmt::Result {
    out.push_str(
        r#"
  ### Feature: unprivileged
  # Mounts an unprivileged instance performs inside its user namespace
  mount fstype=sysfs -> /sys/,
  mount options=(rw, nosuid, nodev, noexec, remount) -> /sys/,
  mount options=(ro, nosuid, nodev, noexec, remount) -> /sys/,
  mount options=(rw, remount),
  mount options=(ro, remount),
  mount options=(ro, remount, bind),
  mount options=(rw, remount, bind),
  mount options=(rw, rbind),
"#,
    );
    Ok(())
}
