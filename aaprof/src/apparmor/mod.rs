//! # Per-Instance AppArmor Profiles
//!
//! This module keeps an instance's on-disk AppArmor profile and its in-kernel policy in
//! step with the instance configuration.
//!
//! ## Lifecycle
//!
//! - **load**: create the policy namespace (stacking hosts), rewrite the profile file if
//!   its content changed, then `apparmor_parser -rWL`.
//! - **unload**: remove the namespace (best effort), then `apparmor_parser -RWL`.
//! - **parse**: `apparmor_parser -QWL` only.
//! - **delete**: remove the profile file and its cache entry, ignoring failures.
//!
//! Hosts without AppArmor, or where this process lacks `mac_admin`, turn every operation
//! into a successful no-op.
//!
//! ## Caching
//!
//! The parser's binary cache is keyed on file mtimes. Profiles are therefore only written
//! when the rendered text differs from what is on disk, so restarting an unchanged
//! instance never forces a recompile.

mod cache;
mod error;
mod host;
mod identity;
mod lifecycle;
mod namespace;
mod parser;
mod template;
mod version;

pub use cache::{read_current, write_if_changed};
pub use error::ProfileError;
pub use host::HostCapabilities;
pub use identity::{
    MAX_NAME_LEN, NAME_OVERHEAD, ProfileIdentity, bounded_qualifier, full_profile_name,
    namespace_name, profile_short_name,
};
pub use lifecycle::ProfileManager;
pub use namespace::{ensure_namespace, namespace_path, teardown_namespace};
pub use parser::{CommandRunner, Feature, Parser, ParserCommand, SystemRunner};
pub use template::{ProfileContext, raw_apparmor_block, render_profile};
pub use version::DottedVersion;
