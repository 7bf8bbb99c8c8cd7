//! # Host Configuration
//!
//! `Config` describes where this host keeps its AppArmor state and how to reach the
//! AppArmor userspace and kernel interfaces. It is loaded once (from a TOML file or
//! defaults) and handed explicitly to every component that needs a path.
//!
//! ## Layout
//!
//! - `<var_dir>/security/apparmor/cache`: the parser's binary policy cache.
//! - `<var_dir>/security/apparmor/profiles/<short-name>`: rendered profile text.
//! - `<security_dir>/policy/namespaces/<namespace>`: kernel policy namespaces.
//!
//! Every field has a default matching a stock host, so an empty file is a valid config.
//! `security_dir` and `proc_self_dir` are configurable mainly so tests can point them at a
//! temporary directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host-level settings for AppArmor profile management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Variable data directory of the instance runtime. Its path also feeds the
    /// host qualifier of every profile and namespace name.
    pub var_dir: PathBuf,
    /// Name or path of the AppArmor parser binary.
    pub parser: String,
    /// Root of the AppArmor securityfs interface.
    pub security_dir: PathBuf,
    /// `/proc/self` of the managing process.
    pub proc_self_dir: PathBuf,
    /// Prefix of every generated profile name.
    pub profile_prefix: String,
    /// Set to `false` to treat AppArmor as unavailable regardless of host support.
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            var_dir: PathBuf::from("/var/lib/lxd"),
            parser: "apparmor_parser".to_string(),
            security_dir: PathBuf::from("/sys/kernel/security/apparmor"),
            proc_self_dir: PathBuf::from("/proc/self"),
            profile_prefix: "lxd".to_string(),
            enabled: true,
        }
    }
}

impl Config {
    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `<var_dir>/security/apparmor`
    pub fn apparmor_dir(&self) -> PathBuf {
        self.var_dir.join("security").join("apparmor")
    }

    /// Default parser cache directory (before any `--print-cache-dir` redirect).
    pub fn cache_dir(&self) -> PathBuf {
        self.apparmor_dir().join("cache")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.apparmor_dir().join("profiles")
    }

    pub fn profile_path(&self, short_name: &str) -> PathBuf {
        self.profiles_dir().join(short_name)
    }

    pub fn namespaces_dir(&self) -> PathBuf {
        self.security_dir.join("policy").join("namespaces")
    }
}
