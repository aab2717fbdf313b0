//! Centralized path definitions for config files and logs.
//!
//! This module is the single source of truth for leaf filenames and
//! directory names. No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Application identity ─────────────────────────────────────────

pub const APP_ID: &str = "com.sheetsense.app";

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const CREDENTIALS_FILE: &str = ".credentials";

// ── Directory names ──────────────────────────────────────────────

pub const LOGS_DIR: &str = "logs";

// ── Config-dir functions (take app_config_dir) ───────────────────

pub fn settings_path(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(SETTINGS_FILE)
}

pub fn credentials_path(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(CREDENTIALS_FILE)
}

pub fn logs_dir(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(LOGS_DIR)
}

/// One audit file per day, named `YYYY-MM-DD.jsonl`.
pub fn audit_log_path(app_config_dir: &Path, date: &str) -> PathBuf {
    logs_dir(app_config_dir).join(format!("{date}.jsonl"))
}

// ── Platform config dir ──────────────────────────────────────────

/// `<platform config dir>/com.sheetsense.app`.
pub fn default_config_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        std::env::var("APPDATA")
            .map_or_else(|_| PathBuf::from("C:\\Users\\Default\\AppData\\Roaming"), PathBuf::from)
    } else if cfg!(target_os = "macos") {
        home_dir().join("Library/Application Support")
    } else {
        std::env::var("XDG_CONFIG_HOME").map_or_else(|_| home_dir().join(".config"), PathBuf::from)
    };
    base.join(APP_ID)
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn config_paths_live_under_config_dir() {
        let dir = Path::new("/cfg");
        assert_eq!(settings_path(dir), PathBuf::from("/cfg/settings.json"));
        assert_eq!(credentials_path(dir), PathBuf::from("/cfg/.credentials"));
        assert_eq!(
            audit_log_path(dir, "2026-01-31"),
            PathBuf::from("/cfg/logs/2026-01-31.jsonl")
        );
    }

    #[test]
    fn default_config_dir_ends_with_app_id() {
        assert!(default_config_dir().ends_with(APP_ID));
    }
}
