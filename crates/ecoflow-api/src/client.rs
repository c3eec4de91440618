// Signed open-API HTTP client
//
// Wraps `reqwest::Client` with request signing, URL construction and
// `{ code, message, data }` envelope unwrapping. Every call is signed
// fresh; nothing is retried here.

use reqwest::Method;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{CmdSetRequest, CmdSetResponse, DeviceInfo, Envelope, SUCCESS_CODE};
use crate::signing::Signer;
use crate::transport::TransportConfig;

pub const DEVICE_LIST_PATH: &str = "/iot-open/sign/device/list";
pub const DEVICE_QUOTA_ALL_PATH: &str = "/iot-open/sign/device/quota/all";
pub const DEVICE_QUOTA_PATH: &str = "/iot-open/sign/device/quota";

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// HTTP client for the signed `/iot-open/sign/*` endpoints.
///
/// Holds no long-lived connection state beyond reqwest's pool; it is
/// cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    signer: Signer,
}

impl ApiClient {
    /// Build a client from the developer key pair and a `TransportConfig`.
    pub fn new(
        base_url: Url,
        access_key: impl Into<String>,
        secret_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, Signer::new(access_key, secret_key)))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, signer: Signer) -> Self {
        Self {
            http,
            base_url,
            signer,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn access_key(&self) -> &str {
        self.signer.access_key()
    }

    // ── Request plumbing ─────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    /// Issue one signed call and return the raw response body.
    ///
    /// GET sends `params` as the canonical query string; POST and PUT send
    /// them as the JSON body. Both forms are signed over the same flattened
    /// parameters. Any other verb fails with [`Error::UnsupportedMethod`].
    pub async fn execute(
        &self,
        method: &Method,
        path: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<String, Error> {
        let mut url = self.endpoint(path)?;
        let signed = self.signer.sign(params);

        let mut request = if *method == Method::GET {
            if !signed.query.is_empty() {
                url.set_query(Some(&signed.query));
            }
            self.http.get(url.clone())
        } else if *method == Method::POST || *method == Method::PUT {
            let body = match params {
                Some(map) => serde_json::to_string(map),
                None => serde_json::to_string(&Map::new()),
            }
            .map_err(|e| Error::invalid_response(format!("failed to encode body: {e}"), ""))?;
            self.http
                .request(method.clone(), url.clone())
                .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body)
        } else {
            return Err(Error::UnsupportedMethod(method.to_string()));
        };

        debug!(%method, %url, nonce = %signed.nonce, "signed request");

        for (name, value) in signed.headers() {
            request = request.header(name, value);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text().await.map_err(Error::Transport)
    }

    // ── Operations ───────────────────────────────────────────────────

    /// List the devices bound to this developer account.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, Error> {
        let body = self.execute(&Method::GET, DEVICE_LIST_PATH, None).await?;
        let envelope: Envelope<Vec<DeviceInfo>> = serde_json::from_str(&body)
            .map_err(|e| Error::invalid_response(e.to_string(), &body))?;
        Ok(envelope.into_result()?.data.unwrap_or_default())
    }

    /// Read every quota of one device.
    ///
    /// With a non-empty `selector` the nested object at that top-level key
    /// is returned; with an empty one the whole decoded envelope is.
    pub async fn get_device_parameters(
        &self,
        sn: &str,
        selector: &str,
    ) -> Result<Map<String, Value>, Error> {
        let mut params = Map::new();
        params.insert("sn".into(), Value::String(sn.to_owned()));

        let body = self
            .execute(&Method::GET, DEVICE_QUOTA_ALL_PATH, Some(&params))
            .await?;
        let mut envelope = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(Error::invalid_response("envelope is not an object", &body)),
            Err(e) => return Err(Error::invalid_response(e.to_string(), &body)),
        };

        let code = envelope.get("code").and_then(Value::as_str).unwrap_or("");
        if code != SUCCESS_CODE {
            return Err(Error::Remote {
                code: code.to_owned(),
                message: envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            });
        }

        if selector.is_empty() {
            return Ok(envelope);
        }

        match envelope.remove(selector) {
            Some(Value::Object(nested)) => Ok(nested),
            Some(_) => Err(Error::invalid_response(
                format!("`{selector}` is not an object"),
                &body,
            )),
            None => Err(Error::invalid_response(
                format!("`{selector}` missing from response"),
                &body,
            )),
        }
    }

    /// Every quota of one device, unwrapped from the envelope's `data`.
    pub async fn get_device_all_parameters(&self, sn: &str) -> Result<Map<String, Value>, Error> {
        self.get_device_parameters(sn, "data").await
    }

    /// Write a device parameter.
    ///
    /// A non-`"0"` code is an error; the write must be treated as not
    /// applied.
    pub async fn set_device_parameter(
        &self,
        request: &CmdSetRequest,
    ) -> Result<CmdSetResponse, Error> {
        let params = match serde_json::to_value(request) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(Error::invalid_response("request is not an object", "")),
            Err(e) => return Err(Error::invalid_response(e.to_string(), "")),
        };

        let body = self
            .execute(&Method::PUT, DEVICE_QUOTA_PATH, Some(&params))
            .await?;
        let response: CmdSetResponse = serde_json::from_str(&body)
            .map_err(|e| Error::invalid_response(e.to_string(), &body))?;

        if response.code == SUCCESS_CODE {
            Ok(response)
        } else {
            Err(Error::Remote {
                code: response.code,
                message: response.message,
            })
        }
    }
}
