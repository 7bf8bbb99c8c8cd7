//! # Logging Initialization
//!
//! One call to `init_logging()` at the start of `main` installs the global `tracing`
//! subscriber. A `std::sync::Once` guards it, so repeated calls are harmless.
//!
//! ## Logging Configuration
//!
//! 1.  **Environment Filter (`EnvFilter`)**: `RUST_LOG` wins when set. Otherwise the given
//!     level applies to everything, with `debug` for the `aaprof` crate itself.
//!
//! 2.  **File Logging (Default)**: with `log_to_file = true`, logs go to a daily rolling file
//!     in the user cache directory (from the `directories` crate), without ANSI colors.
//!
//! 3.  **Stderr Logging**: with `log_to_file = false`, logs go to `stderr` with colors.
//!
//! 4.  **Stderr Fallback**: if the cache directory cannot be determined or written, file
//!     logging silently falls back to `stderr`.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(log_level: &str) -> String {
    format!("{log_level},aaprof=debug")
}

/// Initializes the logging system.
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for configurations that can fail.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

        if log_to_file && let Some(proj_dirs) = ProjectDirs::from("org", "aaprof", "aaprof") {
            let log_dir = proj_dirs.cache_dir();

            // tracing_appender::rolling::daily panics on permission errors, so probe first.
            let file_appender_result = if test_write_permission(log_dir) {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    tracing_appender::rolling::daily(log_dir, "aaprof.log")
                }))
            } else {
                Err(Box::new("Cannot write to log directory") as Box<dyn std::any::Any + Send>)
            };

            if let Ok(file_appender) = file_appender_result {
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(non_blocking).with_ansi(false))
                    .init();
                // Leaked so buffered lines are flushed at exit.
                Box::leak(Box::new(guard));
                return;
            }
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(true))
            .init();
    });

    Ok(())
}

/// Create `dir` if needed and check that a file can be written in it.
fn test_write_permission(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }

    let test_file = dir.join(".aaprof_log_test");
    match std::fs::write(&test_file, "test") {
        Ok(()) => {
            let _ = std::fs::remove_file(&test_file);
            true
        }
        Err(_) => false,
    }
}
