use thiserror::Error;

/// Top-level error type for the `ecoflow-api` crate.
///
/// Covers every failure mode across the signed open API, the account
/// (login/certification) endpoints, and the MQTT broker session.
/// `ecoflow-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or broker credential exchange rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from the vendor API.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Vendor envelope ─────────────────────────────────────────────
    /// The vendor returned a non-`"0"` application code. The message text
    /// is preserved verbatim.
    #[error("EcoFlow API error (code {code}): {message}")]
    Remote { code: String, message: String },

    /// Malformed JSON, or an expected field/shape is missing.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    /// HTTP verb the signed client does not implement.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    // ── Broker ──────────────────────────────────────────────────────
    /// Initial broker handshake failed.
    #[error("Broker connection failed: {0}")]
    BrokerConnect(String),

    /// Subscribe request could not be queued on the broker session.
    #[error("Broker subscribe failed for {topic}: {reason}")]
    BrokerSubscribe { topic: String, reason: String },

    // ── Control ─────────────────────────────────────────────────────
    /// The caller's cancellation token fired before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this error came from a rejected login or
    /// credential exchange.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// The client itself never retries; callers use this to decide.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::BrokerConnect(_) => true,
            _ => false,
        }
    }

    /// The vendor application code, if this is a [`Remote`](Self::Remote) error.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }

    pub(crate) fn invalid_response(message: impl Into<String>, body: &str) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            body: body.to_owned(),
        }
    }
}
