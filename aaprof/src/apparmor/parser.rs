//! Access to the `apparmor_parser` binary: running it, and asking it which features and
//! cache layout it supports.
//!
//! Process execution sits behind [`CommandRunner`] so the lifecycle can be exercised without
//! a real parser. Feature detection never fails: a parser that cannot report its version is
//! treated as supporting nothing newer than the baseline.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use super::error::ProfileError;
use super::version::DottedVersion;

/// Runs an external program to completion and returns its stdout.
///
/// A non-zero exit status is an [`ProfileError::ExternalTool`] carrying the combined
/// stdout/stderr of the process.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<String, ProfileError>;
}

/// Runs commands with `std::process::Command`. Blocks until the process exits; there is
/// no timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, ProfileError> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            ProfileError::ExternalTool {
                program: program.to_string(),
                args: args.to_vec(),
                output: String::new(),
                reason: e.to_string(),
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", stdout.trim(), stderr.trim());
        Err(ProfileError::ExternalTool {
            program: program.to_string(),
            args: args.to_vec(),
            output: combined.trim().to_string(),
            reason: output.status.to_string(),
        })
    }
}

/// The three ways the lifecycle invokes the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserCommand {
    /// Load or replace the profile in the kernel.
    Load,
    /// Remove the profile from the kernel.
    Unload,
    /// Compile only, without touching the kernel.
    Parse,
}

impl ParserCommand {
    /// Short option letter understood by `apparmor_parser`.
    pub fn flag(self) -> char {
        match self {
            ParserCommand::Load => 'r',
            ParserCommand::Unload => 'R',
            ParserCommand::Parse => 'Q',
        }
    }

    /// Combined option: the command plus write-cache (`W`) and cache-location (`L`).
    pub fn option(self) -> String {
        format!("-{}WL", self.flag())
    }
}

impl std::fmt::Display for ParserCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParserCommand::Load => "load",
            ParserCommand::Unload => "unload",
            ParserCommand::Parse => "parse",
        };
        write!(f, "{name}")
    }
}

/// Optional policy features that depend on the parser version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Unix socket, signal and ptrace mediation rules.
    Unix,
}

impl Feature {
    pub fn min_version(self) -> DottedVersion {
        match self {
            Feature::Unix => DottedVersion::new(vec![2, 10, 95]),
        }
    }
}

/// First parser version with per-kernel-feature cache directories.
fn multi_cache_version() -> DottedVersion {
    DottedVersion::new(vec![2, 13])
}

/// Handle on the host's `apparmor_parser`.
pub struct Parser {
    program: String,
    runner: Arc<dyn CommandRunner>,
    version: OnceLock<DottedVersion>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("program", &self.program)
            .field("version", &self.version.get())
            .finish()
    }
}

impl Parser {
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
            version: OnceLock::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn run(&self, args: &[String]) -> Result<String, ProfileError> {
        self.runner.run(&self.program, args)
    }

    /// Installed parser version. Successful answers are remembered; failures are retried
    /// on the next call.
    pub fn version(&self) -> Result<DottedVersion, ProfileError> {
        if let Some(v) = self.version.get() {
            return Ok(v.clone());
        }

        let args = vec!["--version".to_string()];
        let output = self.run(&args)?;
        let token = output
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().last())
            .ok_or_else(|| ProfileError::ExternalTool {
                program: self.program.clone(),
                args: args.clone(),
                output: output.clone(),
                reason: "no version in output".to_string(),
            })?;

        let version: DottedVersion = token.parse()?;
        debug!("Detected AppArmor parser version {}", version);
        Ok(self.version.get_or_init(|| version).clone())
    }

    /// Whether the installed parser understands `feature`. Any detection error counts as
    /// unsupported.
    pub fn supports(&self, feature: Feature) -> bool {
        match self.version() {
            Ok(version) => version >= feature.min_version(),
            Err(e) => {
                warn!("Unable to get AppArmor version: {}", e);
                false
            }
        }
    }

    /// Directory holding the compiled cache entries for this kernel.
    ///
    /// Parsers from 2.13 on split the cache per kernel feature set under `default_dir`
    /// and report the effective directory via `--print-cache-dir`. Older parsers, and any
    /// failure along the way, use `default_dir` itself.
    pub fn cache_dir(&self, default_dir: &Path) -> PathBuf {
        let version = match self.version() {
            Ok(v) => v,
            Err(e) => {
                warn!("Unable to get AppArmor version: {}", e);
                return default_dir.to_path_buf();
            }
        };

        if version < multi_cache_version() {
            return default_dir.to_path_buf();
        }

        let args = vec![
            "-L".to_string(),
            default_dir.to_string_lossy().into_owned(),
            "--print-cache-dir".to_string(),
        ];
        match self.run(&args) {
            Ok(output) if !output.trim().is_empty() => PathBuf::from(output.trim()),
            Ok(_) => {
                warn!("AppArmor parser printed an empty cache directory");
                default_dir.to_path_buf()
            }
            Err(e) => {
                warn!("Unable to get AppArmor cache directory: {}", e);
                default_dir.to_path_buf()
            }
        }
    }
}
