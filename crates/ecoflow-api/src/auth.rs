// Account login and broker credential exchange.
//
// The broker is not reachable with the developer key pair. Instead the
// account's email/password log in to `/auth/login`, and the session token is
// exchanged at `/iot-auth/app/certification` for short-lived broker
// credentials. Both calls are unsigned and never retried here.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::models::Envelope;
use crate::transport::TransportConfig;

pub const LOGIN_PATH: &str = "/auth/login";
pub const CERTIFICATION_PATH: &str = "/iot-auth/app/certification";

const LOGIN_SCENE: &str = "IOT_APP";
const LOGIN_USER_TYPE: &str = "ECOFLOW";
const LANG_HEADER: &str = "lang";
const LANG: &str = "en_US";

// ── Public types ─────────────────────────────────────────────────────

/// Result of a successful account login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: SecretString,
    pub user_id: String,
}

/// Ephemeral broker connection credentials.
///
/// Re-fetched for every new broker session and never persisted.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub account: String,
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    /// Transport scheme as reported by the vendor, e.g. `mqtts`.
    pub protocol: String,
    pub user_id: String,
}

impl BrokerCredentials {
    /// Whether the session must be wrapped in TLS.
    pub fn uses_tls(&self) -> bool {
        matches!(
            self.protocol.to_ascii_lowercase().as_str(),
            "mqtts" | "ssl" | "tls"
        )
    }

    /// Whether the vendor asked for MQTT over websockets, which this
    /// client does not speak.
    pub fn uses_websocket(&self) -> bool {
        matches!(self.protocol.to_ascii_lowercase().as_str(), "ws" | "wss")
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: String,
    scene: &'a str,
    user_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    user: LoginUser,
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginUser {
    user_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificationData {
    certificate_account: String,
    certificate_password: String,
    url: String,
    /// Sent as a string by the vendor, but tolerate a bare number.
    port: Value,
    protocol: String,
}

// ── AccountClient ────────────────────────────────────────────────────

/// Client for the account endpoints used to bootstrap a broker session.
#[derive(Debug, Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AccountClient {
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
        })
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    /// Log in with the account email and password.
    ///
    /// The password is sent base64-encoded together with the fixed
    /// `IOT_APP` scene and `ECOFLOW` user type.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginSession, Error> {
        let url = self.endpoint(LOGIN_PATH)?;
        let body = LoginRequest {
            email,
            password: STANDARD.encode(password.expose_secret().as_bytes()),
            scene: LOGIN_SCENE,
            user_type: LOGIN_USER_TYPE,
        };

        debug!(%url, email, "account login");

        let resp = self
            .http
            .post(url.clone())
            .header(LANG_HEADER, LANG)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;
        let text = read_body(resp, &url).await?;

        let envelope: Envelope<LoginData> =
            serde_json::from_str(&text).map_err(|e| Error::Authentication {
                message: format!("malformed login response: {e}"),
            })?;
        if !envelope.is_success() {
            return Err(Error::Authentication {
                message: format!("login rejected (code {}): {}", envelope.code, envelope.message),
            });
        }
        let data = envelope.data.ok_or_else(|| Error::Authentication {
            message: "login response carries no data".into(),
        })?;
        if data.token.is_empty() || data.user.user_id.is_empty() {
            return Err(Error::Authentication {
                message: "login response is missing token or user id".into(),
            });
        }

        info!(
            user_id = %data.user.user_id,
            email = data.user.email.as_deref().unwrap_or(email),
            "logged in to EcoFlow account"
        );

        Ok(LoginSession {
            token: SecretString::from(data.token),
            user_id: data.user.user_id,
        })
    }

    /// Exchange a session token for broker credentials.
    ///
    /// `user_id` is stamped from the session; the endpoint does not echo it
    /// reliably.
    pub async fn fetch_broker_credentials(
        &self,
        session: &LoginSession,
    ) -> Result<BrokerCredentials, Error> {
        let mut url = self.endpoint(CERTIFICATION_PATH)?;
        url.query_pairs_mut().append_pair("userId", &session.user_id);

        debug!(%url, "fetching broker credentials");

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(session.token.expose_secret())
            .header(LANG_HEADER, LANG)
            .send()
            .await
            .map_err(Error::Transport)?;
        let text = read_body(resp, &url).await?;

        let envelope: Envelope<CertificationData> =
            serde_json::from_str(&text).map_err(|e| Error::Authentication {
                message: format!("malformed certification response: {e}"),
            })?;
        if !envelope.is_success() {
            return Err(Error::Authentication {
                message: format!(
                    "certification rejected (code {}): {}",
                    envelope.code, envelope.message
                ),
            });
        }
        let data = envelope.data.ok_or_else(|| Error::Authentication {
            message: "certification response carries no data".into(),
        })?;

        let port = parse_port(&data.port).ok_or_else(|| Error::Authentication {
            message: format!("invalid broker port: {}", data.port),
        })?;

        Ok(BrokerCredentials {
            account: data.certificate_account,
            password: SecretString::from(data.certificate_password),
            host: data.url,
            port,
            protocol: data.protocol,
            user_id: session.user_id.clone(),
        })
    }

    /// Log in, then exchange the session for broker credentials.
    pub async fn broker_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<BrokerCredentials, Error> {
        let session = self.login(email, password).await?;
        self.fetch_broker_credentials(&session).await
    }
}

async fn read_body(resp: reqwest::Response, url: &Url) -> Result<String, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    resp.text().await.map_err(Error::Transport)
}

fn parse_port(value: &Value) -> Option<u16> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        _ => None,
    }
}
