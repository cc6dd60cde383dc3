use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::{debug, error};

use crate::error::ClientError;

/// Keyword-style initializer for `StationConfig`.
///
/// Every field is optional; absent fields leave the corresponding
/// configuration value uninitialized. This is also the on-disk layout.
///
/// Example TOML:
/// ```toml
/// api_url = "https://api.example.com/"
/// api_timeout = 5.0
/// verify_ssl = true
/// enable_debug = "yes"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub api_url: Option<String>,
    pub api_timeout: Option<f64>,
    pub verify_ssl: Option<bool>,
    pub enable_debug: Option<String>,
    pub enable_http_trace: Option<bool>,
    pub api_username: Option<String>,
    pub api_password: Option<String>,
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("Failed to parse station settings")
    }

    /// Load settings from the default path, or return empty settings if the file doesn't exist yet.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Path to the settings file.
    pub fn config_file_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-station", "station-core")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("station.toml"))
    }
}

/// Validated connection parameters for the station API.
///
/// Each field has a getter, a validating setter and a `clear_*` method that
/// returns it to the uninitialized state. Reading an uninitialized required
/// field yields `ClientError::NotInitialized`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationConfig {
    api_url: Option<String>,
    api_timeout: Option<f64>,
    verify_ssl: Option<bool>,
    enable_debug: Option<String>,
    enable_http_trace: Option<bool>,
    api_username: Option<String>,
    api_password: Option<String>,
}

impl StationConfig {
    /// Build a config by running every present setting through its setter.
    pub fn from_settings(settings: Settings) -> Result<Self, ClientError> {
        let mut cfg = Self::default();

        if let Some(url) = settings.api_url {
            cfg.set_api_url(url)?;
        }
        if let Some(timeout) = settings.api_timeout {
            cfg.set_api_timeout(timeout)?;
        }
        if let Some(verify) = settings.verify_ssl {
            cfg.set_verify_ssl(verify);
        }
        if let Some(flag) = settings.enable_debug {
            cfg.set_enable_debug(flag)?;
        }
        if settings.enable_http_trace.is_some() {
            cfg.set_enable_http_trace(settings.enable_http_trace);
        }
        if let Some(username) = settings.api_username {
            cfg.set_api_username(username)?;
        }
        if let Some(password) = settings.api_password {
            cfg.set_api_password(password);
        }

        Ok(cfg)
    }

    /// Load and validate the settings file from the platform config directory.
    pub fn load() -> anyhow::Result<Self> {
        let settings = Settings::load()?;
        Self::from_settings(settings).context("Invalid station configuration")
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let settings = Settings::load_from(path)?;
        Self::from_settings(settings)
            .with_context(|| format!("Invalid station configuration in {}", path.display()))
    }

    /// The full URL of the station API.
    pub fn api_url(&self) -> Result<&str, ClientError> {
        self.api_url
            .as_deref()
            .ok_or(ClientError::NotInitialized("api_url"))
    }

    pub fn set_api_url(&mut self, value: impl Into<String>) -> Result<(), ClientError> {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return Err(ClientError::invalid(
                "api_url",
                "Empty value for api_url not allowed",
            ));
        }

        let parsed = Url::parse(value).map_err(|e| {
            ClientError::invalid("api_url", format!("Given URL {value} is not valid: {e}"))
        })?;

        // The WHATWG parser fills in a host for "https:host"; require the authority marker.
        let has_authority = value
            .get(parsed.scheme().len() + 1..)
            .is_some_and(|rest| rest.starts_with("//"));

        if parsed.scheme().is_empty() || parsed.host_str().is_none() || !has_authority {
            error!("Given URL {value} has no protocol or host included in its URL (http/https).");
            return Err(ClientError::invalid(
                "api_url",
                format!("Given URL {value} is not valid: scheme and host are required"),
            ));
        }

        self.api_url = Some(value.to_string());
        Ok(())
    }

    pub fn clear_api_url(&mut self) {
        self.api_url = None;
    }

    /// Seconds to wait for the API before a request times out.
    pub fn api_timeout(&self) -> Result<f64, ClientError> {
        self.api_timeout
            .ok_or(ClientError::NotInitialized("api_timeout"))
    }

    pub fn set_api_timeout(&mut self, value: f64) -> Result<(), ClientError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ClientError::invalid(
                "api_timeout",
                format!("timeout must be a positive number of seconds, got {value}"),
            ));
        }
        Duration::try_from_secs_f64(value).map_err(|e| {
            ClientError::invalid("api_timeout", format!("timeout {value} is out of range: {e}"))
        })?;

        self.api_timeout = Some(value);
        Ok(())
    }

    pub fn clear_api_timeout(&mut self) {
        self.api_timeout = None;
    }

    pub(crate) fn timeout_duration(&self) -> Result<Duration, ClientError> {
        // Setter guarantees the value converts.
        let secs = self.api_timeout()?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| ClientError::invalid("api_timeout", e.to_string()))
    }

    /// Whether TLS certificates are verified when connecting to the API.
    pub fn verify_ssl(&self) -> Result<bool, ClientError> {
        self.verify_ssl
            .ok_or(ClientError::NotInitialized("verify_ssl"))
    }

    pub fn set_verify_ssl(&mut self, value: bool) {
        self.verify_ssl = Some(value);
    }

    pub fn clear_verify_ssl(&mut self) {
        self.verify_ssl = None;
    }

    /// Debug flag; any set value enables request logging.
    pub fn enable_debug(&self) -> Result<&str, ClientError> {
        self.enable_debug
            .as_deref()
            .ok_or(ClientError::NotInitialized("enable_debug"))
    }

    pub fn set_enable_debug(&mut self, value: impl Into<String>) -> Result<(), ClientError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ClientError::invalid(
                "enable_debug",
                "Empty value for enable_debug not allowed",
            ));
        }
        self.enable_debug = Some(value);
        Ok(())
    }

    pub fn clear_enable_debug(&mut self) {
        self.enable_debug = None;
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.enable_debug.is_some()
    }

    /// Whether response bodies are dumped to the log. Defaults to `false`.
    pub fn enable_http_trace(&self) -> bool {
        self.enable_http_trace.unwrap_or(false)
    }

    /// Accepts `bool` or `Option<bool>`; `None` is stored as `false`.
    pub fn set_enable_http_trace(&mut self, value: impl Into<Option<bool>>) {
        let value = value.into().unwrap_or(false);
        self.enable_http_trace = Some(value);
        debug!("Property enable_http_trace set to {value}");
    }

    pub fn clear_enable_http_trace(&mut self) {
        self.enable_http_trace = None;
    }

    pub fn api_username(&self) -> Option<&str> {
        self.api_username.as_deref()
    }

    pub fn set_api_username(&mut self, value: impl Into<String>) -> Result<(), ClientError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ClientError::invalid(
                "api_username",
                "Empty value for api_username not allowed",
            ));
        }
        self.api_username = Some(value);
        Ok(())
    }

    pub fn clear_api_username(&mut self) {
        self.api_username = None;
    }

    pub fn api_password(&self) -> Option<&str> {
        self.api_password.as_deref()
    }

    pub fn set_api_password(&mut self, value: impl Into<String>) {
        self.api_password = Some(value.into());
    }

    pub fn clear_api_password(&mut self) {
        self.api_password = None;
    }
}

impl TryFrom<Settings> for StationConfig {
    type Error = ClientError;

    fn try_from(settings: Settings) -> Result<Self, Self::Error> {
        Self::from_settings(settings)
    }
}
