//! # aaprof
//!
//! AppArmor profile lifecycle management for sandboxed instances (containers and VMs).
//!
//! Each instance gets its own generated AppArmor profile. This crate derives the profile
//! and namespace names, renders the profile text from the instance configuration and the
//! host's capabilities, writes it to disk only when it changed, and drives
//! `apparmor_parser` to load, unload, or parse it.
//!
//! ## Modules
//!
//! - **`apparmor`**: names, feature detection, rendering, and the load/unload/parse/delete
//!   lifecycle.
//! - **`config`**: host paths and settings, loaded from TOML.
//! - **`instance`**: the read-only instance view and a JSON-loadable implementation.
//! - **`shell`**: the `aaprof` command-line interface.
//! - **`utils`**: logging setup.

pub mod apparmor;
pub mod config;
pub mod instance;
pub mod shell;
pub mod utils;
