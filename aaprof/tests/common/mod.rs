//! Shared helpers for aaprof integration tests.

#![allow(dead_code)]

use aaprof::apparmor::{CommandRunner, HostCapabilities, ProfileError, ProfileManager};
use aaprof::config::Config;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A `CommandRunner` that records every invocation and answers from a script.
#[derive(Debug)]
pub struct FakeRunner {
    calls: Mutex<Vec<Vec<String>>>,
    version_output: Mutex<Option<String>>,
    cache_dir_output: Mutex<Option<String>>,
    fail_commands: Mutex<bool>,
}

impl FakeRunner {
    pub fn new(version: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            version_output: Mutex::new(Some(format!(
                "AppArmor parser version {version}\nCopyright (C) 1999-2008 Novell Inc.\n"
            ))),
            cache_dir_output: Mutex::new(None),
            fail_commands: Mutex::new(false),
        })
    }

    /// A parser whose `--version` fails.
    pub fn broken() -> Arc<Self> {
        let runner = Self::new("0");
        *runner.version_output.lock().unwrap() = None;
        runner
    }

    pub fn set_version_output(&self, output: &str) {
        *self.version_output.lock().unwrap() = Some(output.to_string());
    }

    pub fn set_cache_dir_output(&self, output: Option<&str>) {
        *self.cache_dir_output.lock().unwrap() = output.map(str::to_string);
    }

    /// Make load/unload/parse invocations exit non-zero.
    pub fn fail_commands(&self, fail: bool) {
        *self.fail_commands.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations other than version and cache-dir queries.
    pub fn parser_commands(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| {
                !args.iter().any(|a| a == "--version" || a == "--print-cache-dir")
            })
            .collect()
    }

    pub fn version_queries(&self) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.iter().any(|a| a == "--version"))
            .count()
    }

    fn failure(&self, program: &str, args: &[String], output: &str) -> ProfileError {
        ProfileError::ExternalTool {
            program: program.to_string(),
            args: args.to_vec(),
            output: output.to_string(),
            reason: "exit status: 1".to_string(),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, ProfileError> {
        self.calls.lock().unwrap().push(args.to_vec());

        if args.iter().any(|a| a == "--version") {
            return self
                .version_output
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| self.failure(program, args, "apparmor_parser: not found"));
        }

        if args.iter().any(|a| a == "--print-cache-dir") {
            return self
                .cache_dir_output
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| self.failure(program, args, "unknown option"));
        }

        if *self.fail_commands.lock().unwrap() {
            return Err(self.failure(program, args, "AppArmor parser error: syntax error"));
        }

        Ok(String::new())
    }
}

/// A temporary host: every configured path lives under one `TempDir`.
pub struct TestHost {
    pub dir: TempDir,
    pub config: Config,
}

impl TestHost {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = Config {
            var_dir: root.join("var").join("lib").join("lxd"),
            parser: "apparmor_parser".to_string(),
            security_dir: root.join("securityfs").join("apparmor"),
            proc_self_dir: root.join("proc").join("self"),
            profile_prefix: "lxd".to_string(),
            enabled: true,
        };
        std::fs::create_dir_all(config.namespaces_dir()).unwrap();
        std::fs::create_dir_all(&config.proc_self_dir).unwrap();
        Self { dir, config }
    }

    pub fn manager(&self, caps: HostCapabilities, runner: Arc<FakeRunner>) -> ProfileManager {
        ProfileManager::new(self.config.clone(), caps, runner)
    }

    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.config.namespaces_dir().join(namespace)
    }

    /// Every file below the temp root, for "nothing changed" assertions.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        let mut entries = Vec::new();
        collect(self.dir.path(), &mut entries);
        entries.sort();
        entries
    }
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
    if let Ok(read_dir) = std::fs::read_dir(dir) {
        for entry in read_dir.flatten() {
            let path = entry.path();
            out.push(path.clone());
            if path.is_dir() {
                collect(&path, out);
            }
        }
    }
}

/// A fully capable host with stacking.
pub fn admin_caps() -> HostCapabilities {
    HostCapabilities {
        available: true,
        admin: true,
        stacking: true,
        stacked: false,
        user_namespace: false,
        cgroup_namespace: true,
    }
}

/// AppArmor available, but no `mac_admin`.
pub fn available_caps() -> HostCapabilities {
    HostCapabilities {
        admin: false,
        ..admin_caps()
    }
}

/// Backdate a file's mtime so a later rewrite is observable.
pub fn backdate(path: &Path) -> SystemTime {
    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(old).unwrap();
    old
}

pub fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}
