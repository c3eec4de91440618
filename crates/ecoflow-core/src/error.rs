// ── Core error types ──
//
// User-facing errors from ecoflow-core. Consumers never see raw HTTP or
// JSON failures; `From<ecoflow_api::Error>` translates transport-layer
// errors into these kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── Vendor errors ────────────────────────────────────────────────
    /// Non-`"0"` application code; the write or read did not happen.
    #[error("EcoFlow API error (code {code}): {message}")]
    Remote { code: String, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Control ──────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ecoflow_api::Error> for CoreError {
    fn from(err: ecoflow_api::Error) -> Self {
        match err {
            ecoflow_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ecoflow_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                }
            }
            ecoflow_api::Error::HttpStatus { status, url } => match status {
                401 | 403 => CoreError::AuthenticationFailed {
                    message: format!("HTTP {status} from {url}"),
                },
                _ => CoreError::ConnectionFailed {
                    url,
                    reason: format!("HTTP {status}"),
                },
            },
            ecoflow_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ecoflow_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ecoflow_api::Error::Remote { code, message } => CoreError::Remote { code, message },
            ecoflow_api::Error::InvalidResponse { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
            ecoflow_api::Error::UnsupportedMethod(method) => CoreError::Unsupported {
                operation: format!("HTTP {method}"),
            },
            ecoflow_api::Error::BrokerConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Broker connection failed: {reason}"),
            },
            ecoflow_api::Error::BrokerSubscribe { topic, reason } => {
                CoreError::Internal(format!("Subscribe to {topic} failed: {reason}"))
            }
            ecoflow_api::Error::Cancelled => CoreError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_code_and_message() {
        let err = CoreError::from(ecoflow_api::Error::Remote {
            code: "1006".into(),
            message: "device offline".into(),
        });
        assert!(
            matches!(&err, CoreError::Remote { code, message } if code == "1006" && message == "device offline")
        );
    }

    #[test]
    fn auth_statuses_map_to_authentication() {
        let err = CoreError::from(ecoflow_api::Error::HttpStatus {
            status: 401,
            url: "https://api.ecoflow.com/auth/login".into(),
        });
        assert!(err.is_auth());

        let err = CoreError::from(ecoflow_api::Error::HttpStatus {
            status: 502,
            url: "https://api.ecoflow.com/iot-open/sign/device/list".into(),
        });
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }

    #[test]
    fn cancellation_passes_through() {
        assert!(matches!(
            CoreError::from(ecoflow_api::Error::Cancelled),
            CoreError::Cancelled
        ));
    }
}
