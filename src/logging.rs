use color_eyre::Result;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::cache::CacheManager;

pub const LOG_FILE: &str = "callboard.log";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Batch mode
    Stderr,
    /// Appended to the cache directory so the dashboard screen stays clean
    CacheFile,
}

/// `RUST_LOG` when set, otherwise `debug` or `warn`.
pub fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("callboard=debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}

pub fn init_logging(target: LogTarget, debug: bool, cache: &CacheManager) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_target(false);
    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::CacheFile => {
            cache.ensure_cache_dir()?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(cache.cache_file(LOG_FILE))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    installed.map_err(|e| color_eyre::eyre::eyre!("Could not install logger: {}", e))
}
