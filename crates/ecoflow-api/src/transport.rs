// Shared transport configuration for building reqwest::Client instances.
//
// The signed open-API client and the account client share TLS, timeout,
// and user-agent settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Default vendor API host. Every endpoint path is joined onto this.
pub const DEFAULT_API_URL: &str = "https://api.ecoflow.com";

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Add a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request deadline. Applies to every call made by the client.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            user_agent: concat!("ecoflow-rs/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str());

        if let TlsMode::CustomCa(path) = &self.tls {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
