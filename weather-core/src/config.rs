use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::provider::ProviderId;

pub const ENV_GOOGLE_API_KEY: &str = "GGMAP_API_KEY";
pub const ENV_OPENWEATHER_API_KEY: &str = "OPEN_WEATHER_API_KEY";
pub const ENV_BIND_ADDR: &str = "WEATHER_BIND_ADDR";
pub const ENV_MAX_FORECAST_DAYS: &str = "WEATHER_MAX_FORECAST_DAYS";

/// Credentials and endpoint for a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's default scheme and host, e.g. `http://127.0.0.1:8080`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted `days` offset for forecast requests.
    pub max_forecast_days: u32,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            max_forecast_days: 30,
            request_timeout_secs: 10,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Load config from the platform config directory, or return an empty
    /// default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(cfg)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-aggregator", "weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from environment variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_GOOGLE_API_KEY) {
            self.upsert_provider_api_key(ProviderId::Google, key);
        }
        if let Some(key) = lookup(ENV_OPENWEATHER_API_KEY) {
            self.upsert_provider_api_key(ProviderId::OpenWeather, key);
        }
        if let Some(bind) = lookup(ENV_BIND_ADDR) {
            self.server.bind = bind;
        }
        if let Some(days) = lookup(ENV_MAX_FORECAST_DAYS) {
            self.server.max_forecast_days = days.trim().parse().with_context(|| {
                format!("{ENV_MAX_FORECAST_DAYS} must be a non-negative integer, got '{days}'")
            })?;
        }

        Ok(())
    }

    /// Reject values that would make every upstream call fail.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Set/replace a provider API key, keeping any configured base URL.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert(ProviderConfig { api_key, base_url: None });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| pairs.iter().find(|(name, _)| *name == k).map(|(_, v)| v.to_string())
    }

    #[test]
    fn default_config_has_no_providers() {
        let cfg = Config::default();

        assert!(!cfg.is_provider_configured(ProviderId::Google));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
        assert_eq!(cfg.server.bind, "0.0.0.0:3000");
        assert_eq!(cfg.server.max_forecast_days, 30);
    }

    #[test]
    fn upsert_keeps_base_url() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "google".into(),
            ProviderConfig { api_key: "OLD".into(), base_url: Some("http://localhost:9".into()) },
        );

        cfg.upsert_provider_api_key(ProviderId::Google, "NEW".into());

        let google = cfg.provider_config(ProviderId::Google).expect("google must exist");
        assert_eq!(google.api_key, "NEW");
        assert_eq!(google.base_url.as_deref(), Some("http://localhost:9"));
    }

    #[test]
    fn blank_key_is_not_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "  ".into());

        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn env_overrides_keys_and_server() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(env(&[
            (ENV_GOOGLE_API_KEY, "G_KEY"),
            (ENV_OPENWEATHER_API_KEY, "OW_KEY"),
            (ENV_BIND_ADDR, "127.0.0.1:8080"),
            (ENV_MAX_FORECAST_DAYS, "7"),
        ]))
        .expect("overrides should apply");

        assert_eq!(cfg.provider_api_key(ProviderId::Google), Some("G_KEY"));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("OW_KEY"));
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert_eq!(cfg.server.max_forecast_days, 7);
    }

    #[test]
    fn env_override_rejects_bad_forecast_days() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides(env(&[(ENV_MAX_FORECAST_DAYS, "soon")]))
            .unwrap_err();

        assert!(err.to_string().contains(ENV_MAX_FORECAST_DAYS));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Google, "G_KEY".into());
        cfg.server.max_forecast_days = 5;
        cfg.save_to(&path).expect("save should succeed");

        let loaded = Config::load_from(&path).expect("load should succeed");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:4000"

            [providers.openweather]
            api_key = "OW"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.server.bind, "127.0.0.1:4000");
        assert_eq!(cfg.server.request_timeout_secs, 10);
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("OW"));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nrequest_timeout_secs = 0\n").expect("write config");

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("request_timeout_secs"));

        let mut cfg = Config::default();
        assert!(cfg.validate().is_ok());
        cfg.server.request_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();

        assert!(err.to_string().contains("Failed to read config file"));
    }
}
