use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use super::cache;
use super::error::ProfileError;
use super::host::HostCapabilities;
use super::identity::ProfileIdentity;
use super::namespace;
use super::parser::{CommandRunner, Feature, Parser, ParserCommand, SystemRunner};
use super::template::{self, ProfileContext};
use crate::config::Config;
use crate::instance::Instance;

/// Loads, unloads, parses and deletes per-instance AppArmor profiles.
///
/// Every operation is idempotent. Calls for different instances may run concurrently;
/// calls for the same instance must be serialized by the caller.
#[derive(Debug)]
pub struct ProfileManager {
    config: Config,
    caps: HostCapabilities,
    parser: Parser,
}

impl ProfileManager {
    pub fn new(config: Config, caps: HostCapabilities, runner: Arc<dyn CommandRunner>) -> Self {
        let parser = Parser::new(config.parser.clone(), runner);
        Self {
            config,
            caps,
            parser,
        }
    }

    /// Manager for the real host: capabilities are detected from `config` and the parser
    /// runs as a child process.
    pub fn from_host(config: Config) -> Self {
        let caps = HostCapabilities::detect(&config);
        Self::new(config, caps, Arc::new(SystemRunner))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capabilities(&self) -> &HostCapabilities {
        &self.caps
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn identity(&self, instance: &dyn Instance) -> ProfileIdentity {
        ProfileIdentity::derive(&self.config, instance)
    }

    pub fn profile_path(&self, instance: &dyn Instance) -> PathBuf {
        self.config.profile_path(&self.identity(instance).short_name)
    }

    /// Render the profile text for `instance` on this host.
    pub fn render(&self, instance: &dyn Instance) -> Result<String, ProfileError> {
        let identity = self.identity(instance);
        let ctx = ProfileContext::new(
            &self.caps,
            instance,
            &identity,
            self.parser.supports(Feature::Unix),
            &self.config.var_dir,
        );
        template::render_profile(&ctx)
    }

    /// Make sure the instance's policy is loaded into the kernel so it can start.
    pub fn load(&self, instance: &dyn Instance) -> Result<(), ProfileError> {
        if !self.caps.admin {
            return Ok(());
        }

        let identity = self.identity(instance);
        namespace::ensure_namespace(&self.config, &self.caps, &identity.namespace)?;

        let profile = self.config.profile_path(&identity.short_name);
        let updated = self.render(instance)?;
        let cache_dir = self.config.cache_dir();
        let profiles_dir = self.config.profiles_dir();
        cache::write_if_changed(
            &profile,
            &updated,
            &[cache_dir.as_path(), profiles_dir.as_path()],
        )?;

        self.run_parser(ParserCommand::Load, instance)
    }

    /// Remove the instance's policy (and namespace) from the kernel. The profile stays on
    /// disk and in the cache.
    pub fn unload(&self, instance: &dyn Instance) -> Result<(), ProfileError> {
        if !self.caps.admin {
            return Ok(());
        }

        let identity = self.identity(instance);
        namespace::teardown_namespace(&self.config, &self.caps, &identity.namespace);

        self.run_parser(ParserCommand::Unload, instance)
    }

    /// Compile the on-disk profile without loading it.
    pub fn parse(&self, instance: &dyn Instance) -> Result<(), ProfileError> {
        if !self.caps.available {
            return Ok(());
        }

        self.run_parser(ParserCommand::Parse, instance)
    }

    /// Remove the instance's profile from disk and from the parser cache.
    ///
    /// Removal failures are expected (an instance that never started has neither) and are
    /// ignored.
    pub fn delete(&self, instance: &dyn Instance) {
        if !self.caps.admin {
            return;
        }

        let short_name = self.identity(instance).short_name;
        let cache_entry = self
            .parser
            .cache_dir(&self.config.cache_dir())
            .join(&short_name);
        let profile = self.config.profile_path(&short_name);

        for path in [cache_entry, profile] {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Not removing {}: {}", path.display(), e);
            }
        }
    }

    /// Run the parser against the instance's profile file.
    pub fn run_parser(
        &self,
        command: ParserCommand,
        instance: &dyn Instance,
    ) -> Result<(), ProfileError> {
        if !self.caps.available {
            return Ok(());
        }

        let profile = self.profile_path(instance);
        let args = vec![
            command.option(),
            self.config.cache_dir().to_string_lossy().into_owned(),
            profile.to_string_lossy().into_owned(),
        ];

        match self.parser.run(&args) {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    action = %command,
                    output = e.output().unwrap_or_default(),
                    err = %e,
                    "Running apparmor"
                );
                Err(e)
            }
        }
    }
}
