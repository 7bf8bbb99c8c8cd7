//! Profile and namespace names for an instance.
//!
//! The short name (`lxd-<instance>`) names the profile file on disk. The full name and the
//! namespace name add a host qualifier derived from the data directory so that several
//! runtimes on one kernel never collide:
//!
//! ```text
//! lxd-c1_</var/lib/lxd>     full profile name
//! lxd-c1_<var-lib-lxd>      policy namespace name
//! ```

use sha2::{Digest as _, Sha256};
use std::path::Path;

use crate::config::Config;
use crate::instance::{Instance, project_qualified_name};

/// Longest policy name the kernel accepts.
pub const MAX_NAME_LEN: usize = 253;

/// Characters added around the qualifier when building a name.
pub const NAME_OVERHEAD: usize = 7;

/// Return `qualifier` unchanged if it fits, otherwise its lowercase hex SHA-256 digest.
pub fn bounded_qualifier(qualifier: &str) -> String {
    if qualifier.len() + NAME_OVERHEAD >= MAX_NAME_LEN {
        let mut hasher = Sha256::new();
        hasher.update(qualifier.as_bytes());
        return format!("{:x}", hasher.finalize());
    }

    qualifier.to_string()
}

pub fn profile_short_name(prefix: &str, instance: &dyn Instance) -> String {
    let name = project_qualified_name(instance.project(), instance.name());
    format!("{prefix}-{name}")
}

/// `/` is not allowed in namespace names, so the data directory is flattened to
/// `var-lib-lxd` (leading slash dropped).
pub fn namespace_name(prefix: &str, instance: &dyn Instance, var_dir: &Path) -> String {
    let var_dir = var_dir.to_string_lossy();
    let flattened = var_dir.trim_matches('/').replace('/', "-");
    qualified_name(prefix, instance, &flattened)
}

pub fn full_profile_name(prefix: &str, instance: &dyn Instance, var_dir: &Path) -> String {
    qualified_name(prefix, instance, &var_dir.to_string_lossy())
}

fn qualified_name(prefix: &str, instance: &dyn Instance, qualifier: &str) -> String {
    let name = project_qualified_name(instance.project(), instance.name());
    format!("{prefix}-{name}_<{}>", bounded_qualifier(qualifier))
}

/// All names of one instance's profile.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProfileIdentity {
    pub short_name: String,
    pub full_name: String,
    pub namespace: String,
}

impl ProfileIdentity {
    pub fn derive(config: &Config, instance: &dyn Instance) -> Self {
        let prefix = &config.profile_prefix;
        Self {
            short_name: profile_short_name(prefix, instance),
            full_name: full_profile_name(prefix, instance, &config.var_dir),
            namespace: namespace_name(prefix, instance, &config.var_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceSpec;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_short_name() {
        let c1 = InstanceSpec::new("c1");
        assert_eq!(profile_short_name("lxd", &c1), "lxd-c1");

        let web = InstanceSpec::new("c1").with_project("web");
        assert_eq!(profile_short_name("lxd", &web), "lxd-web_c1");
    }

    #[test]
    fn test_full_and_namespace_names() {
        let c1 = InstanceSpec::new("c1");
        let var_dir = Path::new("/var/lib/lxd");
        assert_eq!(full_profile_name("lxd", &c1, var_dir), "lxd-c1_</var/lib/lxd>");
        assert_eq!(namespace_name("lxd", &c1, var_dir), "lxd-c1_<var-lib-lxd>");
    }

    #[test]
    fn test_namespace_trims_trailing_slash() {
        let c1 = InstanceSpec::new("c1");
        assert_eq!(
            namespace_name("lxd", &c1, Path::new("/var/snap/lxd/common/lxd/")),
            "lxd-c1_<var-snap-lxd-common-lxd>"
        );
    }

    #[test]
    fn test_qualifier_boundary() {
        let fits = "a".repeat(MAX_NAME_LEN - NAME_OVERHEAD - 1);
        assert_eq!(bounded_qualifier(&fits), fits);

        let at_limit = "a".repeat(MAX_NAME_LEN - NAME_OVERHEAD);
        let hashed = bounded_qualifier(&at_limit);
        assert_eq!(hashed.len(), 64);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(hashed, at_limit);
    }

    #[test]
    fn test_digest_format_is_lowercase_hex() {
        let mut hasher = Sha256::new();
        hasher.update(b"");
        assert_eq!(format!("{:x}", hasher.finalize()), EMPTY_SHA256);

        let long = "x".repeat(400);
        assert_eq!(bounded_qualifier(&long), bounded_qualifier(&long));
        assert_ne!(bounded_qualifier(&long), bounded_qualifier(&"y".repeat(400)));
    }

    #[test]
    fn test_long_var_dir_keeps_names_bounded() {
        let c1 = InstanceSpec::new("c1");
        let deep = format!("/{}", "d/".repeat(200));
        let var_dir = Path::new(&deep);
        assert!(full_profile_name("lxd", &c1, var_dir).len() <= MAX_NAME_LEN);
        assert!(namespace_name("lxd", &c1, var_dir).len() <= MAX_NAME_LEN);
    }

    #[test]
    fn test_identity_derive() {
        let config = Config::default();
        let id = ProfileIdentity::derive(&config, &InstanceSpec::new("c1").with_project("p"));
        assert_eq!(id.short_name, "lxd-p_c1");
        assert_eq!(id.full_name, "lxd-p_c1_</var/lib/lxd>");
        assert_eq!(id.namespace, "lxd-p_c1_<var-lib-lxd>");
    }
}
