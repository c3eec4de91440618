//! Canonical request signing for the EcoFlow open API.
//!
//! Every call carries four headers: `accessKey`, `nonce`, `timestamp` and
//! `sign`. The signature is a lowercase-hex HMAC-SHA256, keyed by the secret
//! key, over the canonical query string followed by the
//! access-key/nonce/timestamp triple:
//!
//! ```text
//! permanentWatts=2000&accessKey=AK&nonce=123456&timestamp=1700000000000000000
//! ```
//!
//! The canonical query string flattens nested parameters into dotted
//! (`params.cmdSet`) and bracketed (`ids[0]`) key paths and sorts the
//! resulting `key=value` pairs by raw byte order, so the same parameters
//! always produce the same bytes regardless of map iteration order.

use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Number, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_KEY_HEADER: &str = "accessKey";
pub const NONCE_HEADER: &str = "nonce";
pub const TIMESTAMP_HEADER: &str = "timestamp";
pub const SIGN_HEADER: &str = "sign";

// ── SignedRequest ────────────────────────────────────────────────────

/// Authorization material for exactly one HTTP call.
///
/// Built fresh per request and never reused: the server accepts a
/// nonce/timestamp pair only once within its replay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Canonical query string (may be empty).
    pub query: String,
    pub access_key: String,
    /// Six decimal digits, `100000..=999999`.
    pub nonce: String,
    /// UTC nanoseconds since the epoch, decimal text.
    pub timestamp: String,
    /// Lowercase hex HMAC-SHA256 of [`signing_base`](Self::signing_base).
    pub sign: String,
}

impl SignedRequest {
    /// The exact string that was HMAC-signed.
    pub fn signing_base(&self) -> String {
        signing_base(&self.query, &self.access_key, &self.nonce, &self.timestamp)
    }

    /// Header name/value pairs to attach to the HTTP request.
    pub fn headers(&self) -> [(&'static str, &str); 4] {
        [
            (ACCESS_KEY_HEADER, self.access_key.as_str()),
            (NONCE_HEADER, self.nonce.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
            (SIGN_HEADER, self.sign.as_str()),
        ]
    }
}

// ── Signer ───────────────────────────────────────────────────────────

/// Holds the developer access/secret key pair and signs request parameters.
#[derive(Debug, Clone)]
pub struct Signer {
    access_key: String,
    secret_key: SecretString,
}

impl Signer {
    pub fn new(access_key: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key,
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Sign `params` with a fresh random nonce and the current clock.
    pub fn sign(&self, params: Option<&Map<String, Value>>) -> SignedRequest {
        self.sign_with(params, &generate_nonce(), &generate_timestamp())
    }

    /// Sign `params` with a caller-supplied nonce and timestamp.
    ///
    /// Pure function of its inputs; [`sign`](Self::sign) feeds it the
    /// random source and the clock.
    pub fn sign_with(
        &self,
        params: Option<&Map<String, Value>>,
        nonce: &str,
        timestamp: &str,
    ) -> SignedRequest {
        let query = params.map(canonical_query).unwrap_or_default();
        let base = signing_base(&query, &self.access_key, nonce, timestamp);
        let sign = hmac_sha256_hex(&base, self.secret_key.expose_secret());

        SignedRequest {
            query,
            access_key: self.access_key.clone(),
            nonce: nonce.to_owned(),
            timestamp: timestamp.to_owned(),
            sign,
        }
    }
}

// ── Canonical query string ───────────────────────────────────────────

/// Flatten `params` depth-first and join the byte-sorted `key=value` pairs
/// with `&`.
pub fn canonical_query(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(key, value, &mut pairs);
    }
    // `String`'s `Ord` is lexicographic over the UTF-8 bytes.
    pairs.sort_unstable();
    pairs.join("&")
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(&format!("{prefix}.{key}"), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), item, out);
            }
        }
        Value::String(s) => out.push(format!("{prefix}={s}")),
        Value::Number(n) => out.push(format!("{prefix}={}", render_number(n))),
        Value::Bool(b) => out.push(format!("{prefix}={b}")),
        // Nulls carry no value and are left out of the signature.
        Value::Null => {}
    }
}

/// Integers render without a decimal point; floats use the shortest
/// round-trippable form, so `2000.0` also renders as `2000`.
fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}

/// Build the string that gets HMAC-signed.
pub fn signing_base(query: &str, access_key: &str, nonce: &str, timestamp: &str) -> String {
    let triple = format!(
        "{ACCESS_KEY_HEADER}={access_key}&{NONCE_HEADER}={nonce}&{TIMESTAMP_HEADER}={timestamp}"
    );
    if query.is_empty() {
        triple
    } else {
        format!("{query}&{triple}")
    }
}

/// Lowercase hex HMAC-SHA256 of `message` keyed by `secret`.
pub fn hmac_sha256_hex(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Uniformly random six-digit decimal nonce.
pub fn generate_nonce() -> String {
    rand::thread_rng().gen_range(100_000..=999_999_u32).to_string()
}

/// Current UTC instant in nanoseconds since the epoch, as decimal text.
pub fn generate_timestamp() -> String {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .map_or_else(|| now.timestamp_micros().saturating_mul(1000), |n| n)
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn test_signer() -> Signer {
        Signer::new("AK", SecretString::from("test-secret"))
    }

    #[test]
    fn permanent_watts_fixture() {
        let p = params(json!({ "permanentWatts": 2000 }));
        let signed = test_signer().sign_with(Some(&p), "123456", "1700000000000000000");

        assert_eq!(signed.query, "permanentWatts=2000");
        assert_eq!(
            signed.signing_base(),
            "permanentWatts=2000&accessKey=AK&nonce=123456&timestamp=1700000000000000000"
        );
        assert_eq!(
            signed.sign,
            "a86b8c00cbdec18b533d5c73b286f414f8e9b9359e785789a7b436f3d2d7f256"
        );
    }

    #[test]
    fn empty_parameters_sign_only_the_triple() {
        let signed = test_signer().sign_with(None, "123456", "1700000000000000000");
        assert_eq!(signed.query, "");
        assert_eq!(
            signed.signing_base(),
            "accessKey=AK&nonce=123456&timestamp=1700000000000000000"
        );
        assert_eq!(
            signed.sign,
            "bfca0a0c9800cf0927802ea7cb5c75f27c20b4db0d77f5f64b65c284035660c7"
        );

        let empty = Map::new();
        let same = test_signer().sign_with(Some(&empty), "123456", "1700000000000000000");
        assert_eq!(same, signed);
    }

    #[test]
    fn integral_float_renders_without_decimal_point() {
        let p = params(json!({ "permanentWatts": 2000.0 }));
        assert_eq!(canonical_query(&p), "permanentWatts=2000");

        let p = params(json!({ "ratio": 0.25, "neg": -3, "on": true, "off": false }));
        assert_eq!(canonical_query(&p), "neg=-3&off=false&on=true&ratio=0.25");
    }

    #[test]
    fn nested_maps_and_sequences_flatten_to_paths() {
        let p = params(json!({
            "sn": "HW51ZEH49G9X1234",
            "cmdCode": "WN511_SET_PERMANENT_WATTS_PACK",
            "params": { "permanentWatts": 200, "quotas": ["a", "b"] },
            "ids": [ { "x": 1 }, 2 ],
            "skip": null
        }));
        assert_eq!(
            canonical_query(&p),
            "cmdCode=WN511_SET_PERMANENT_WATTS_PACK&ids[0].x=1&ids[1]=2\
             &params.permanentWatts=200&params.quotas[0]=a&params.quotas[1]=b\
             &sn=HW51ZEH49G9X1234"
        );
    }

    #[test]
    fn canonical_query_ignores_insertion_order() {
        let mut forward = Map::new();
        let mut backward = Map::new();
        let entries = [
            ("zeta", json!(1)),
            ("Alpha", json!("x")),
            ("alpha", json!({ "b": 2, "a": 1 })),
            ("_id", json!([true, false])),
        ];
        for (k, v) in &entries {
            forward.insert((*k).into(), v.clone());
        }
        for (k, v) in entries.iter().rev() {
            backward.insert((*k).into(), v.clone());
        }
        assert_eq!(canonical_query(&forward), canonical_query(&backward));
    }

    #[test]
    fn pairs_are_in_byte_order() {
        let p = params(json!({
            "b": 1, "B": 2, "a.b": 3, "a": { "a": 4 }, "a_": 5, "ä": 6, "0": 7
        }));
        let query = canonical_query(&p);
        let pairs: Vec<&str> = query.split('&').collect();
        for window in pairs.windows(2) {
            assert!(
                window[0].as_bytes() <= window[1].as_bytes(),
                "{} should sort before {}",
                window[0],
                window[1]
            );
        }
        assert_eq!(pairs.len(), 7);
    }

    #[test]
    fn signature_verifies_against_emitted_fields() {
        let signer = test_signer();
        let p = params(json!({ "sn": "DEV1", "params": { "x": 1.5 } }));
        for _ in 0..16 {
            let signed = signer.sign(Some(&p));
            let recomputed = hmac_sha256_hex(
                &signing_base(&signed.query, "AK", &signed.nonce, &signed.timestamp),
                "test-secret",
            );
            assert_eq!(signed.sign, recomputed);
        }
    }

    #[test]
    fn nonce_is_six_digits_in_range() {
        for _ in 0..256 {
            let nonce = generate_nonce();
            assert_eq!(nonce.len(), 6);
            let n: u32 = nonce.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn timestamp_is_nanoseconds() {
        let ts: i64 = generate_timestamp().parse().unwrap();
        // After 2020-01-01 in nanoseconds.
        assert!(ts > 1_577_836_800_000_000_000);
    }

    #[test]
    fn headers_carry_signature_fields() {
        let signed = test_signer().sign_with(None, "654321", "42");
        let headers = signed.headers();
        assert_eq!(headers[0], ("accessKey", "AK"));
        assert_eq!(headers[1], ("nonce", "654321"));
        assert_eq!(headers[2], ("timestamp", "42"));
        assert_eq!(headers[3].0, "sign");
    }
}
