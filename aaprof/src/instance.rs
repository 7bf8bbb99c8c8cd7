//! The view of an instance that profile management needs.
//!
//! Instances are owned by the instance runtime; this crate only reads them through the
//! [`Instance`] trait. [`InstanceSpec`] is a plain implementation used by the CLI (loaded
//! from JSON) and by tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Project name whose instances are not project-qualified.
pub const DEFAULT_PROJECT: &str = "default";

/// Configuration key holding raw AppArmor rules appended to the generated profile.
pub const RAW_APPARMOR_KEY: &str = "raw.apparmor";

/// Read-only accessors for an instance.
pub trait Instance {
    fn project(&self) -> &str;
    fn name(&self) -> &str;
    fn is_nesting(&self) -> bool;
    fn is_privileged(&self) -> bool;
    fn expanded_config(&self) -> &HashMap<String, String>;
}

/// Instance name as seen by the host: `<project>_<name>`, or the bare name in the
/// default project.
pub fn project_qualified_name(project: &str, name: &str) -> String {
    if project.is_empty() || project == DEFAULT_PROJECT {
        name.to_string()
    } else {
        format!("{project}_{name}")
    }
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSpec {
    #[serde(default = "default_project")]
    pub project: String,
    pub name: String,
    #[serde(default)]
    pub nesting: bool,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl InstanceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: default_project(),
            name: name.into(),
            nesting: false,
            privileged: false,
            config: HashMap::new(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_nesting(mut self, nesting: bool) -> Self {
        self.nesting = nesting;
        self
    }

    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read instance file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse instance file {}", path.display()))
    }
}

impl Instance for InstanceSpec {
    fn project(&self) -> &str {
        &self.project
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_nesting(&self) -> bool {
        self.nesting
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn expanded_config(&self) -> &HashMap<String, String> {
        &self.config
    }
}
