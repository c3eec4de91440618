//! Shared configuration for the EcoFlow CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `ecoflow_core::ControllerConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ecoflow_core::{ControllerConfig, DEFAULT_API_URL, TlsMode};

/// Keyring service holding `<profile>/secret-key` and `<profile>/password`.
pub const KEYRING_SERVICE: &str = "ecoflow";
/// Fallback environment variable for the account password.
pub const PASSWORD_ENV: &str = "ECOFLOW_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: &'static str },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named developer-account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::ProfileNotFound { name }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Device list refresh while listening, seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    300
}

/// A named developer-account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API host; defaults to the public vendor endpoint.
    pub api_url: Option<String>,

    /// Developer access key.
    pub access_key: Option<String>,

    /// Developer secret key (plaintext; keyring or env var preferred).
    pub secret_key: Option<String>,

    /// Environment variable name containing the secret key.
    pub secret_key_env: Option<String>,

    /// Account email, needed for the broker session only.
    pub email: Option<String>,

    /// Account password (plaintext; keyring preferred).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout, seconds.
    pub timeout: Option<u64>,

    /// Override device list refresh, seconds.
    pub refresh_interval: Option<u64>,

    /// Upper bound on broker reconnect backoff, seconds.
    pub max_reconnect_interval: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ecoflow", "ecoflow").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ecoflow");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then `ECOFLOW_`-prefixed environment.
///
/// Nested keys use a double underscore: `ECOFLOW_DEFAULTS__TIMEOUT=10`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ECOFLOW_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(profile_name: &str, entry: &str) -> Option<SecretString> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{entry}"))
        .ok()?
        .get_password()
        .ok()
        .map(SecretString::from)
}

/// Resolve the developer secret key: named env var → keyring → plaintext.
pub fn resolve_secret_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.secret_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(secret) = keyring_secret(profile_name, "secret-key") {
        return Ok(secret);
    }

    if let Some(ref key) = profile.secret_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: "secret key",
    })
}

/// Resolve the account login, if the profile has an email.
///
/// Password order: `ECOFLOW_PASSWORD` → keyring → plaintext.
pub fn resolve_account(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<(String, SecretString)>, ConfigError> {
    let Some(email) = profile.email.clone() else {
        return Ok(None);
    };

    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(Some((email, SecretString::from(pw))));
    }

    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok(Some((email, pw)));
    }

    if let Some(ref pw) = profile.password {
        return Ok(Some((email, SecretString::from(pw.clone()))));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: "account password",
    })
}

/// Build a `ControllerConfig` from a profile and the global defaults.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let raw_url = profile.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
    let api_url: url::Url = raw_url.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {raw_url}"),
    })?;

    let access_key = profile
        .access_key
        .clone()
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: "access key",
        })?;
    let secret_key = resolve_secret_key(profile, profile_name)?;

    let mut config = ControllerConfig::new(api_url, access_key, secret_key);
    if let Some((email, password)) = resolve_account(profile, profile_name)? {
        config = config.with_account(email, password);
    }

    if let Some(ref ca_path) = profile.ca_cert {
        config.tls = TlsMode::CustomCa(ca_path.clone());
    }
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.refresh_interval =
        Duration::from_secs(profile.refresh_interval.unwrap_or(defaults.refresh_interval));
    if let Some(secs) = profile.max_reconnect_interval {
        config.broker.max_reconnect_interval = Duration::from_secs(secs);
    }

    Ok(config)
}
