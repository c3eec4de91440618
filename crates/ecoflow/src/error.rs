//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ecoflow_config::ConfigError;
use ecoflow_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach {url}")]
    #[diagnostic(
        code(ecoflow::connection_failed),
        help("Check network access to the API host and the broker.\nReason: {reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ecoflow::auth_failed),
        help(
            "Verify the developer key pair and, for `listen`, the account email and password.\n\
             Secrets can live in the system keyring under service 'ecoflow'."
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(ecoflow::no_credentials),
        help(
            "Add it to the profile in your config file, store it in the keyring,\n\
             or pass it with the matching --flag / ECOFLOW_* environment variable."
        )
    )]
    NoCredentials { profile: String, what: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("EcoFlow API error ({code}): {message}")]
    #[diagnostic(code(ecoflow::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ecoflow::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ecoflow::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(ecoflow::no_config),
        help(
            "Create one with a [profiles.default] table holding access_key and secret_key,\n\
             or pass --access-key and --secret-key.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(ecoflow::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(ecoflow::timeout),
        help("Increase the timeout with --timeout or check the API host's responsiveness.")
    )]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Remote { code, message } => CliError::ApiError { code, message },
            CoreError::InvalidResponse { message } => CliError::ApiError {
                code: "invalid_response".into(),
                message,
            },
            CoreError::Unsupported { operation } => CliError::ApiError {
                code: "unsupported".into(),
                message: operation,
            },
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoCredentials { profile, what } => CliError::NoCredentials {
                profile,
                what: what.into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
