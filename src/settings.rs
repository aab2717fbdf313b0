use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::storage::{read_json, write_json, StorageError};

pub const API_KEY_ENV: &str = "SHEETSENSE_API_KEY";
/// Honored when `SHEETSENSE_API_KEY` is unset.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const PORT_ENV: &str = "SHEETSENSE_PORT";

// ── LLM provider types ──────────────────────────────────────────

/// Which model provider translates commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub enum LlmProvider {
    #[default]
    Gemini,
    Anthropic,
    OpenAiCompatible,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-1.5-flash",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAiCompatible => "gpt-4o",
        }
    }

    /// Whether the provider accepts an inline audio attachment.
    pub fn supports_audio(self) -> bool {
        !matches!(self, LlmProvider::Anthropic)
    }
}

/// Full configuration for the chosen provider.
///
/// The `api_key` field is never written to `settings.json`. It is stored in a
/// separate credentials file and loaded/saved via [`load_api_key`]/[`save_api_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL override. Required for self-hosted OpenAI-compatible servers.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override. None = use provider default.
    #[serde(default)]
    pub model: Option<String>,
}

impl LlmProviderConfig {
    pub fn model_or_default(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }
}

// ── Server ──────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_audio_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a voice upload body.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_audio_bytes: default_max_audio_bytes(),
        }
    }
}

// ── App settings ─────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Application-level settings stored in the OS config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct AppSettings {
    pub version: u32,
    #[serde(default)]
    pub llm: LlmProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-request timeout for model and command-server calls.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Append each served cycle to the JSONL audit log.
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

const SETTINGS_VERSION: u32 = 1;

impl Default for AppSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl AppSettings {
    pub fn new() -> Self {
        Self {
            version: SETTINGS_VERSION,
            llm: LlmProviderConfig::default(),
            server: ServerConfig::default(),
            request_timeout_secs: default_timeout_secs(),
            audit_log: true,
        }
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in the
    /// binaries and a map in tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let key = lookup(API_KEY_ENV)
            .or_else(|| lookup(GEMINI_API_KEY_ENV))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(key) = key {
            self.llm.api_key = Some(key);
        }
        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid {PORT_ENV}={raw}"),
            }
        }
    }
}

/// Load the API key from the separate credentials file.
pub fn load_api_key(app_config_dir: &Path) -> Option<String> {
    let path = crate::paths::credentials_path(app_config_dir);
    std::fs::read_to_string(path)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Save the API key to the separate credentials file (atomic write).
pub fn save_api_key(app_config_dir: &Path, key: &str) -> Result<(), StorageError> {
    std::fs::create_dir_all(app_config_dir)?;
    let path = crate::paths::credentials_path(app_config_dir);
    if key.is_empty() {
        let _ = std::fs::remove_file(&path);
    } else {
        crate::storage::atomic_write(&path, key.as_bytes())?;
    }
    Ok(())
}

/// Load settings from the app config directory. Returns None if no settings
/// file exists or it cannot be read.
pub fn load_settings(app_config_dir: &Path) -> Option<AppSettings> {
    let path = crate::paths::settings_path(app_config_dir);
    if !path.exists() {
        return None;
    }
    let mut settings = match read_json::<AppSettings>(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("could not read {}: {e}", path.display());
            return None;
        }
    };
    if settings.llm.api_key.is_none() {
        settings.llm.api_key = load_api_key(app_config_dir);
    }
    Some(settings)
}

/// Settings file (or defaults) plus credentials plus process environment.
pub fn resolve_settings(app_config_dir: &Path) -> AppSettings {
    let mut settings = load_settings(app_config_dir).unwrap_or_else(|| {
        let mut fresh = AppSettings::new();
        fresh.llm.api_key = load_api_key(app_config_dir);
        fresh
    });
    settings.apply_env(|name| std::env::var(name).ok());
    settings
}

/// Save settings to the app config directory.
pub fn save_settings(app_config_dir: &Path, settings: &AppSettings) -> Result<(), StorageError> {
    std::fs::create_dir_all(app_config_dir)?;
    write_json(&crate::paths::settings_path(app_config_dir), settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn settings_round_trip_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppSettings::new();
        settings.llm.api_key = Some("secret-key".into());
        settings.server.port = 8080;
        save_settings(dir.path(), &settings).unwrap();

        let on_disk = std::fs::read_to_string(crate::paths::settings_path(dir.path())).unwrap();
        assert!(!on_disk.contains("secret-key"));

        let loaded = load_settings(dir.path()).expect("should load");
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.llm.provider, LlmProvider::Gemini);
        assert_eq!(loaded.llm.api_key, None);
    }

    #[test]
    fn api_key_comes_from_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        save_settings(dir.path(), &AppSettings::new()).unwrap();
        save_api_key(dir.path(), "  from-file\n").unwrap();
        let loaded = load_settings(dir.path()).unwrap();
        assert_eq!(loaded.llm.api_key.as_deref(), Some("from-file"));

        save_api_key(dir.path(), "").unwrap();
        assert_eq!(load_api_key(dir.path()), None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            crate::paths::settings_path(dir.path()),
            r#"{ "version": 1, "llm": { "provider": "Anthropic" } }"#,
        )
        .unwrap();
        let loaded = load_settings(dir.path()).unwrap();
        assert_eq!(loaded.server, ServerConfig::default());
        assert_eq!(loaded.request_timeout_secs, 60);
        assert!(loaded.audit_log);
        assert_eq!(loaded.llm.model_or_default(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn env_overrides_key_and_port() {
        let env: HashMap<&str, &str> =
            HashMap::from([(GEMINI_API_KEY_ENV, "gem-key"), (PORT_ENV, "4000")]);
        let mut settings = AppSettings::new();
        settings.llm.api_key = Some("file-key".into());
        settings.apply_env(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(settings.llm.api_key.as_deref(), Some("gem-key"));
        assert_eq!(settings.server.port, 4000);

        let env: HashMap<&str, &str> =
            HashMap::from([(API_KEY_ENV, "primary"), (GEMINI_API_KEY_ENV, "gem-key")]);
        settings.apply_env(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(settings.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn invalid_port_env_is_ignored() {
        let mut settings = AppSettings::new();
        settings.apply_env(|name| (name == PORT_ENV).then(|| "not-a-port".to_string()));
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(dir.path()).is_none());
    }

    #[test]
    fn only_anthropic_lacks_audio() {
        assert!(LlmProvider::Gemini.supports_audio());
        assert!(LlmProvider::OpenAiCompatible.supports_audio());
        assert!(!LlmProvider::Anthropic.supports_audio());
    }
}
