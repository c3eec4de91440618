//! CLI configuration: thin wrapper around `ecoflow_config` that applies
//! `GlobalOpts` flag overrides (--api-url, --access-key, ...).

use secrecy::SecretString;

use ecoflow_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use ecoflow_config::{Config, Profile, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ControllerConfig` from the config file, profile, and flags.
///
/// Flags win over every profile source, keyring included.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.access_key.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: names.join(", "),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.api_url {
        profile.api_url = Some(url.clone());
    }
    if let Some(ref key) = global.access_key {
        profile.access_key = Some(key.clone());
    }
    if let Some(ref secret) = global.secret_key {
        profile.secret_key = Some(secret.clone());
    }
    if let Some(ref email) = global.email {
        profile.email = Some(email.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let mut config =
        ecoflow_config::profile_to_controller_config(&profile, &profile_name, &cfg.defaults)?;
    if let Some(ref secret) = global.secret_key {
        config.secret_key = SecretString::from(secret.clone());
    }
    Ok(config)
}
