use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::http_cache::app_cache_dir;

const LOG_FILE: &str = "power_terminal.log";

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr. Used by the headless tools.
pub fn init_stderr(directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}

/// Log to a file, leaving stderr to the terminal UI.
pub fn init_file(directive: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}

pub fn default_log_path() -> PathBuf {
    app_cache_dir()
        .map(|dir| dir.join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE))
}
