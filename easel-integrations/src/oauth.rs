//! Two-legged OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).
//!
//! Only a consumer key/secret pair is used; the token and token secret are
//! empty, so the signing key is `enc(consumer_secret) + "&"`.
//!
//! Signing is a pure function of the request, the credentials and an
//! [`OAuthNonce`]. The nonce/timestamp pair comes from a [`NonceSource`] so
//! tests can pin it.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use easel_core::Secret;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use sha1::Sha1;
use url::Url;

/// Signature method advertised in `oauth_signature_method`.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Protocol version advertised in `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 §2.3: everything except unreserved characters is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

/// Percent-encode a string as required by RFC 5849 §3.6.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Consumer key/secret pair for two-legged OAuth.
#[derive(Debug, Clone, Default)]
pub struct ConsumerCredentials {
    /// Consumer key, sent in the clear as `oauth_consumer_key`.
    pub key: Secret,
    /// Consumer secret, used only to derive the signing key.
    pub secret: Secret,
}

impl ConsumerCredentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(key: impl Into<Secret>, secret: impl Into<Secret>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// True when both the key and the secret are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.key.is_blank() && !self.secret.is_blank()
    }
}

/// The time-varying part of a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthNonce {
    /// Unique nonce for this request.
    pub nonce: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl OAuthNonce {
    /// Create a nonce/timestamp pair.
    #[must_use]
    pub fn new(nonce: impl Into<String>, timestamp: u64) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp,
        }
    }
}

/// Supplies nonce/timestamp pairs for signing.
pub trait NonceSource: Send + Sync {
    /// Produce the nonce and timestamp for the next request.
    fn next(&self) -> OAuthNonce;
}

/// Random UUID nonces stamped with the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNonceSource;

impl NonceSource for SystemNonceSource {
    fn next(&self) -> OAuthNonce {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        OAuthNonce::new(uuid::Uuid::new_v4().simple().to_string(), timestamp)
    }
}

impl NonceSource for OAuthNonce {
    fn next(&self) -> OAuthNonce {
        self.clone()
    }
}

/// Errors raised while computing a signature.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The HMAC could not be keyed.
    #[error("failed to compute OAuth signature: {0}")]
    Hmac(String),
    /// The request URL has no host.
    #[error("cannot sign request without a host: {0}")]
    MissingHost(String),
}

/// An HTTP request with its OAuth `Authorization` header attached.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Full request URL including the query string.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Headers to send, `Authorization` first.
    pub headers: Vec<(String, String)>,
}

impl SignedRequest {
    /// Look up a header value (case-insensitive name).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.header("Authorization")
    }
}

/// Base string URI per RFC 5849 §3.4.1.2: scheme, host, non-default port
/// and path, without the query.
///
/// # Errors
///
/// Returns [`SigningError::MissingHost`] if the URL has no host.
pub fn base_string_uri(url: &Url) -> Result<String, SigningError> {
    let host = url
        .host_str()
        .ok_or_else(|| SigningError::MissingHost(url.to_string()))?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!(
        "{}://{}{}{}",
        url.scheme(),
        host.to_ascii_lowercase(),
        port,
        url.path()
    ))
}

/// Signature base string per RFC 5849 §3.4.1.
///
/// `params` are the protocol parameters; the URL's query parameters are
/// merged in. Pairs are encoded first and then sorted by name, then value.
///
/// # Errors
///
/// Returns [`SigningError::MissingHost`] if the URL has no host.
pub fn signature_base_string(
    method: &Method,
    url: &Url,
    params: &[(&str, &str)],
) -> Result<String, SigningError> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .chain(
            params
                .iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        )
        .collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        percent_encode(&base_string_uri(url)?),
        percent_encode(&normalized)
    ))
}

/// HMAC-SHA1 over `base_string` keyed with `enc(consumer_secret)&`, base64.
///
/// # Errors
///
/// Returns [`SigningError::Hmac`] if the MAC cannot be keyed.
pub fn hmac_sha1_signature(base_string: &str, consumer_secret: &str) -> Result<String, SigningError> {
    let key = format!("{}&", percent_encode(consumer_secret));
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| SigningError::Hmac(e.to_string()))?;
    mac.update(base_string.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization: OAuth ...` header value for a request.
///
/// # Errors
///
/// Returns a [`SigningError`] if the base string or MAC cannot be computed.
pub fn authorization_header(
    method: &Method,
    url: &Url,
    credentials: &ConsumerCredentials,
    nonce: &OAuthNonce,
) -> Result<String, SigningError> {
    let timestamp = nonce.timestamp.to_string();
    let mut params = vec![
        ("oauth_consumer_key", credentials.key.expose()),
        ("oauth_nonce", nonce.nonce.as_str()),
        ("oauth_signature_method", SIGNATURE_METHOD),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_version", OAUTH_VERSION),
    ];

    let base_string = signature_base_string(method, url, &params)?;
    let signature = hmac_sha1_signature(&base_string, credentials.secret.expose())?;
    params.push(("oauth_signature", signature.as_str()));
    params.sort_unstable();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

/// Sign a request, returning it with `Authorization` and `Accept` headers.
///
/// # Errors
///
/// Returns a [`SigningError`] if the signature cannot be computed.
pub fn sign_request(
    method: Method,
    url: Url,
    credentials: &ConsumerCredentials,
    nonce: &OAuthNonce,
) -> Result<SignedRequest, SigningError> {
    let authorization = authorization_header(&method, &url, credentials, nonce)?;
    Ok(SignedRequest {
        url,
        method,
        headers: vec![
            ("Authorization".to_string(), authorization),
            ("Accept".to_string(), "application/json".to_string()),
        ],
    })
}
