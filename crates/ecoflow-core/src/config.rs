// ── Runtime connection configuration ──
//
// Describes how to reach the vendor platform: developer key pair for the
// signed API, optional account login for the broker, and tuning. Never
// touches disk; the CLI builds one from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ecoflow_api::{BrokerConfig, TlsMode};

pub use ecoflow_api::transport::DEFAULT_API_URL;

/// Account login used to obtain broker credentials.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub email: String,
    pub password: SecretString,
}

/// Configuration for one developer account.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API host, e.g. `https://api.ecoflow.com`.
    pub api_url: Url,
    pub access_key: String,
    pub secret_key: SecretString,
    /// Required only for the broker session.
    pub account: Option<AccountCredentials>,
    pub tls: TlsMode,
    /// Per-request HTTP deadline.
    pub timeout: Duration,
    /// How often the device list is re-read while connected. Zero disables
    /// the refresh task.
    pub refresh_interval: Duration,
    pub broker: BrokerConfig,
}

impl ControllerConfig {
    pub fn new(api_url: Url, access_key: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            api_url,
            access_key: access_key.into(),
            secret_key,
            account: None,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(300),
            broker: BrokerConfig::default(),
        }
    }

    pub fn with_account(mut self, email: impl Into<String>, password: SecretString) -> Self {
        self.account = Some(AccountCredentials {
            email: email.into(),
            password,
        });
        self
    }
}
