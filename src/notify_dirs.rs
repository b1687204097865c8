//! Filesystem locations for scheduler state, config and logs.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | State | `~/Library/Application Support/deferred-notify/` | `~/.local/share/deferred-notify/` |
//! | Config | `~/Library/Application Support/deferred-notify/` | `~/.config/deferred-notify/` |
//!
//! Overrides:
//! - `DEFERRED_NOTIFY_DATA_DIR` overrides [`data_dir`]
//! - `DEFERRED_NOTIFY_CONFIG_DIR` overrides [`config_dir`]

use std::path::{Path, PathBuf};

const APP_DIR: &str = "deferred-notify";

/// Persistent state root: identifier store, work queue, fire ledger, logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DEFERRED_NOTIFY_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/deferred-notify-data"))
}

/// Config directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DEFERRED_NOTIFY_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/deferred-notify-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Identifier store file inside a state directory.
#[must_use]
pub fn work_ids_file(state_dir: &Path) -> PathBuf {
    state_dir.join("work_ids.json")
}

/// Pending work queue file inside a state directory.
#[must_use]
pub fn work_queue_file(state_dir: &Path) -> PathBuf {
    state_dir.join("work_queue.json")
}

/// Dispatched-work ledger file inside a state directory.
#[must_use]
pub fn fire_ledger_file(state_dir: &Path) -> PathBuf {
    state_dir.join("fired.jsonl")
}
